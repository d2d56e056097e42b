use ::mysql::Value;

/// String literal rules of one session, following its `sql_mode`.
///
/// Rendering is delegated to the driver's own literal writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Escaper {
    no_backslash_escapes: bool,
}

impl Escaper {
    pub fn new(no_backslash_escapes: bool) -> Self {
        Self {
            no_backslash_escapes,
        }
    }

    /// Picks the rules from a `@@SESSION.sql_mode` value.
    pub fn from_sql_mode(sql_mode: &str) -> Self {
        Self::new(
            sql_mode
                .split(',')
                .any(|mode| mode.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES")),
        )
    }

    pub fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes
    }

    /// A quoted string literal, or `0x..` when `bytes` are not UTF-8.
    pub fn literal(&self, bytes: &[u8]) -> String {
        Value::Bytes(bytes.to_vec()).as_sql(self.no_backslash_escapes)
    }
}

/// Backtick-quotes an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
