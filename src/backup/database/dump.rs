use crate::backup::database::escape::{quote_identifier, Escaper};
use crate::backup::database::{Column, ColumnKind, SqlConnection, SqlValue};
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::rules::DatabaseSpec;

use function_name::named;
use itertools::Itertools;

pub static DEFAULT_CLIENT_ENCODING: &str = "utf8";

/// Renders the tables of one database as a script of `CREATE TABLE` and
/// multi-row `INSERT` statements.
#[derive(Debug, Clone)]
pub struct TableDumper<'a> {
    client_encoding: &'a str,
}

impl Default for TableDumper<'static> {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_ENCODING)
    }
}

impl<'a> TableDumper<'a> {
    pub fn new(client_encoding: &'a str) -> Self {
        Self { client_encoding }
    }

    /// Dumps the database named by `spec` over `conn`.
    ///
    /// Any failing statement aborts the whole script.
    #[named]
    pub fn dump<C: SqlConnection + ?Sized>(
        &self,
        conn: &mut C,
        spec: &DatabaseSpec,
    ) -> Result<String> {
        self.dump_inner(conn, spec)
            .with_debug_object_and_fn_name(spec.name().clone(), function_path!())
    }

    fn dump_inner<C: SqlConnection + ?Sized>(
        &self,
        conn: &mut C,
        spec: &DatabaseSpec,
    ) -> Result<String> {
        conn.select_database(spec.name())?;

        let set_names = format!("SET NAMES {}", self.client_encoding);
        conn.execute(&set_names)?;
        let mut script = format!("{set_names};\n\n\n");

        let tables = spec.select_tables(list_tables(conn)?);
        tracing::debug!("Dumping {} tables of {:?}", tables.len(), spec.name());
        for table in &tables {
            dump_table(conn, table, &mut script)?;
        }

        tracing::info!(
            "Dumped {} tables of {:?} into {} bytes",
            tables.len(),
            spec.name(),
            script.len()
        );
        Ok(script)
    }
}

fn list_tables<C: SqlConnection + ?Sized>(conn: &mut C) -> Result<Vec<String>> {
    Ok(conn
        .query("SHOW TABLES")?
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .map(|name| String::from_utf8_lossy(&name).into_owned())
        .collect())
}

fn table_columns<C: SqlConnection + ?Sized>(conn: &mut C, table: &str) -> Result<Vec<Column>> {
    let sql = format!("SHOW COLUMNS FROM {}", quote_identifier(table));
    conn.query(&sql)?
        .into_iter()
        .map(|row| match (row.first(), row.get(1)) {
            (Some(Some(name)), Some(Some(declared))) => Ok(Column::new(
                String::from_utf8_lossy(name),
                &String::from_utf8_lossy(declared),
            )),
            _ => Err(Error::query(&sql, "column row without name and type")),
        })
        .collect()
}

fn create_statement<C: SqlConnection + ?Sized>(conn: &mut C, table: &str) -> Result<String> {
    let sql = format!("SHOW CREATE TABLE {}", quote_identifier(table));
    conn.query(&sql)?
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().nth(1).flatten())
        .map(|create| String::from_utf8_lossy(&create).into_owned())
        .ok_or_else(|| Error::query(&sql, "no CREATE TABLE statement returned"))
}

fn dump_table<C: SqlConnection + ?Sized>(
    conn: &mut C,
    table: &str,
    script: &mut String,
) -> Result<()> {
    let create = create_statement(conn, table)?;
    script.push_str(&create);
    script.push_str(";\n\n");

    let columns = table_columns(conn, table)?;
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .join(", ");

    let select = format!("SELECT {} FROM {}", column_list, quote_identifier(table));
    let escaper = conn.escaper();
    let mut values = String::new();
    let mut rows = 0usize;
    conn.for_each_row(&select, &mut |row| {
        if rows > 0 {
            values.push_str(", \n");
        }
        values.push_str(&render_tuple(escaper, &columns, &row));
        rows += 1;
        Ok(())
    })?;

    if rows > 0 {
        script.push_str(&format!(
            "INSERT INTO {} ({}) VALUES \n{};\n\n\n\n",
            quote_identifier(table),
            column_list,
            values
        ));
    }
    tracing::trace!("Table {:?}: {} rows", table, rows);
    Ok(())
}

/// `(1, 'Al', NULL)` for one row, classifying each value by its column.
pub fn render_tuple(escaper: Escaper, columns: &[Column], row: &[SqlValue]) -> String {
    let rendered = row
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let kind = columns.get(i).map_or(ColumnKind::Text, Column::kind);
            render_value(escaper, kind, value)
        })
        .join(", ");
    format!("({rendered})")
}

pub fn render_value(escaper: Escaper, kind: ColumnKind, value: &SqlValue) -> String {
    let Some(bytes) = value else {
        return "NULL".to_string();
    };

    match kind {
        ColumnKind::Bit => bit_literal(bytes),
        ColumnKind::Numeric => match std::str::from_utf8(bytes) {
            Ok(text) if is_number_literal(text) => text.to_string(),
            // MySQL converts quoted numbers on insert.
            _ => escaper.literal(bytes),
        },
        ColumnKind::Text => escaper.literal(bytes),
    }
}

/// `-12.5e3`, `42`, `.5`; what the server sends for integer and float types.
fn is_number_literal(text: &str) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
}

fn bit_literal(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "b''".to_string();
    }
    format!("0x{}", bytes.iter().map(|b| format!("{b:02X}")).join(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::database::fake::{sample_databases, FakeConnection, FakeTable};
    use std::collections::BTreeMap;

    fn spec(name: &str) -> DatabaseSpec {
        DatabaseSpec::builder().name(name).build()
    }

    fn single_table(name: &str, table: FakeTable) -> FakeConnection {
        let mut tables = BTreeMap::new();
        tables.insert(name.to_string(), table);
        let mut databases = BTreeMap::new();
        databases.insert("db".to_string(), tables);
        FakeConnection::new(databases)
    }

    #[test]
    fn test_dump_renders_schema_and_rows() {
        let mut conn = FakeConnection::new(sample_databases());
        let script = TableDumper::default().dump(&mut conn, &spec("shop")).unwrap();

        assert!(script.starts_with("SET NAMES utf8;\n\n\n"));
        assert!(script.contains("CREATE TABLE `users` (\n  `id` int(11) NOT NULL"));
        assert!(script.contains(
            "INSERT INTO `users` (`id`, `name`) VALUES \n(1, 'Al'), \n(2, 'O\\'Reilly');\n"
        ));
    }

    #[test]
    fn test_empty_table_has_schema_only() {
        let mut conn = FakeConnection::new(sample_databases());
        let script = TableDumper::default().dump(&mut conn, &spec("shop")).unwrap();

        assert!(script.contains("CREATE TABLE `logs` (\n  `line` text\n);\n\n"));
        assert!(!script.contains("INSERT INTO `logs`"));
    }

    #[test]
    fn test_database_without_tables() {
        let mut conn = FakeConnection::new(sample_databases());
        let script = TableDumper::new("latin1").dump(&mut conn, &spec("blog")).unwrap();
        assert_eq!(script, "SET NAMES latin1;\n\n\n");
    }

    #[test]
    fn test_session_encoding_is_set_before_reading() {
        let mut conn = FakeConnection::new(sample_databases());
        TableDumper::new("utf8mb4").dump(&mut conn, &spec("blog")).unwrap();
        assert_eq!(
            conn.statements(),
            vec!["USE `blog`", "SET NAMES utf8mb4", "SHOW TABLES"]
        );
    }

    #[test]
    fn test_unknown_database_fails() {
        let mut conn = FakeConnection::new(sample_databases());
        let err = TableDumper::default()
            .dump(&mut conn, &spec("missing"))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown database 'missing'"));
    }

    #[test]
    fn test_query_failure_aborts_dump() {
        let mut conn = FakeConnection::new(sample_databases()).failing_on("SELECT");
        let err = TableDumper::default().dump(&mut conn, &spec("shop")).unwrap_err();
        assert!(err.to_string().contains("simulated failure"));
    }

    #[test]
    fn test_table_filters_are_applied() {
        let mut conn = FakeConnection::new(sample_databases());
        let spec = DatabaseSpec::builder()
            .name("shop")
            .exclude_tables(vec!["users".to_string()])
            .build();
        let script = TableDumper::default().dump(&mut conn, &spec).unwrap();

        assert!(script.contains("CREATE TABLE `logs`"));
        assert!(!script.contains("`users`"));
        assert!(!conn.statements().iter().any(|s| s.contains("`users`")));
    }

    #[test]
    fn test_numeric_and_string_classification() {
        let table = FakeTable::new(
            "CREATE TABLE `prices` (`amount` decimal(10,2), `code` char(1))",
            &[("amount", "decimal(10,2)"), ("code", "char(1)")],
        )
        .row(&[Some("12.50"), Some("A")]);
        let mut conn = single_table("prices", table);
        let script = TableDumper::default().dump(&mut conn, &spec("db")).unwrap();
        assert!(script.contains("VALUES \n(12.50, 'A');"));
    }

    #[test]
    fn test_null_and_binary_values() {
        let table = FakeTable::new(
            "CREATE TABLE `t` (`flag` bit(1), `note` text, `data` blob)",
            &[("flag", "bit(1)"), ("note", "text"), ("data", "blob")],
        )
        .raw_row(vec![Some(vec![0x01]), None, Some(vec![0xff, 0x00])])
        .raw_row(vec![None, Some(b"".to_vec()), Some(b"ok".to_vec())]);
        let mut conn = single_table("t", table);
        let script = TableDumper::default().dump(&mut conn, &spec("db")).unwrap();
        assert!(script.contains("VALUES \n(0x01, NULL, 0xFF00), \n(NULL, '', 'ok');"));
    }

    #[test]
    fn test_printable_bit_bytes_stay_binary() {
        let table = FakeTable::new(
            "CREATE TABLE `flags` (`mask` bit(16), `one` bit(8))",
            &[("mask", "bit(16)"), ("one", "bit(8)")],
        )
        .raw_row(vec![Some(vec![0x31, 0x32]), Some(vec![0x41])]);
        let mut conn = single_table("flags", table);
        let script = TableDumper::default().dump(&mut conn, &spec("db")).unwrap();
        assert!(script.contains("VALUES \n(0x3132, 0x41);"));
    }

    #[test]
    fn test_render_value() {
        let e = Escaper::default();
        assert_eq!(render_value(e, ColumnKind::Numeric, &Some(b"42".to_vec())), "42");
        assert_eq!(render_value(e, ColumnKind::Numeric, &Some(b"-1.5e3".to_vec())), "-1.5e3");
        assert_eq!(render_value(e, ColumnKind::Text, &Some(b"42".to_vec())), "'42'");
        assert_eq!(render_value(e, ColumnKind::Text, &Some(b"a'b".to_vec())), "'a\\'b'");
        assert_eq!(render_value(e, ColumnKind::Numeric, &None), "NULL");
        assert_eq!(render_value(e, ColumnKind::Bit, &None), "NULL");
        assert_eq!(render_value(e, ColumnKind::Text, &None), "NULL");
    }

    #[test]
    fn test_bit_values_are_always_hex() {
        let e = Escaper::default();
        assert_eq!(render_value(e, ColumnKind::Bit, &Some(vec![0x31, 0x32])), "0x3132");
        assert_eq!(render_value(e, ColumnKind::Bit, &Some(vec![0x41])), "0x41");
        assert_eq!(render_value(e, ColumnKind::Bit, &Some(vec![0x00, 0x0a])), "0x000A");
        assert_eq!(render_value(e, ColumnKind::Bit, &Some(vec![])), "b''");
    }

    #[test]
    fn test_odd_numeric_text_is_quoted() {
        let e = Escaper::default();
        assert_eq!(render_value(e, ColumnKind::Numeric, &Some(b"1; DROP".to_vec())), "'1; DROP'");
        assert_eq!(render_value(e, ColumnKind::Numeric, &Some(b"".to_vec())), "''");
    }

    #[test]
    fn test_extra_values_default_to_quoted() {
        let columns = vec![Column::new("id", "int")];
        let row = vec![Some(b"1".to_vec()), Some(b"x".to_vec())];
        assert_eq!(render_tuple(Escaper::default(), &columns, &row), "(1, 'x')");
    }
}
