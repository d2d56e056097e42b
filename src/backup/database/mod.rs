//! Database side of a backup: the connection seam, the per-run connection
//! cache and the dumper rendering live tables as a replayable SQL script.

pub mod connection;
pub mod dump;
pub mod escape;
#[cfg(test)]
pub mod fake;
pub mod mysql;

use crate::backup::result_error::result::Result;
use crate::backup::rules::ConnectionParams;

/// A single column value as sent by the server; `None` is SQL `NULL`.
pub type SqlValue = Option<Vec<u8>>;

pub type SqlRow = Vec<SqlValue>;

/// Base types rendered as bare literals.
pub static NUMERIC_TYPES: [&str; 9] = [
    "tinyint",
    "smallint",
    "mediumint",
    "int",
    "bigint",
    "decimal",
    "float",
    "double",
    "real",
];

/// Sent as raw bytes, never as digits.
pub static BIT_TYPE: &str = "bit";

/// An open connection to one server.
///
/// Failures come back as [`Error::Query`](crate::backup::result_error::error::Error::Query)
/// carrying the statement and the server message.
pub trait SqlConnection {
    /// Makes `name` the default database for following statements.
    fn select_database(&mut self, name: &str) -> Result<()>;

    /// Runs a statement whose result, if any, is discarded.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Streams the rows of `sql` into `f` one at a time. The first error from
    /// `f` stops the stream.
    fn for_each_row(
        &mut self,
        sql: &str,
        f: &mut dyn FnMut(SqlRow) -> Result<()>,
    ) -> Result<()>;

    fn query(&mut self, sql: &str) -> Result<Vec<SqlRow>> {
        let mut rows = Vec::new();
        self.for_each_row(sql, &mut |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// The escaping rules of the current session.
    fn escaper(&self) -> escape::Escaper {
        escape::Escaper::default()
    }
}

/// Opens connections for the [`connection::ConnectionCache`].
pub trait Connector {
    type Connection: SqlConnection;

    fn connect(&self, params: &ConnectionParams, database: &str) -> Result<Self::Connection>;
}

/// How the values of a column are written into a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Bit,
    /// Anything unknown lands here and gets quoted.
    Text,
}

/// A column as declared in the table, with the type reduced to its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub base_type: String,
}

impl Column {
    pub fn new<N: Into<String>>(name: N, declared_type: &str) -> Self {
        Self {
            name: name.into(),
            base_type: base_type(declared_type),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        if self.base_type == BIT_TYPE {
            ColumnKind::Bit
        } else if NUMERIC_TYPES.contains(&self.base_type.as_str()) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }
}

/// `decimal(10,2)` -> `decimal`, `int unsigned` -> `int`, lowercased.
pub fn base_type(declared: &str) -> String {
    declared
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
