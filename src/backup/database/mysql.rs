use crate::backup::database::escape::{quote_identifier, Escaper};
use crate::backup::database::{Connector, SqlConnection, SqlRow, SqlValue};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::rules::ConnectionParams;

use ::mysql::prelude::Queryable;
use ::mysql::{Conn, OptsBuilder, Value};

/// Blocking connection to a MySQL server speaking the text protocol.
pub struct MysqlConnection {
    conn: Conn,
    escaper: Escaper,
}

/// Opens [`MysqlConnection`]s over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

impl Connector for MysqlConnector {
    type Connection = MysqlConnection;

    fn connect(&self, params: &ConnectionParams, database: &str) -> Result<MysqlConnection> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(params.host_or_default()))
            .user(Some(params.user()))
            .pass(Some(params.password().inner()))
            .db_name(Some(database));
        let mut conn = Conn::new(opts).map_err(Error::from).with_msg(format!(
            "Connecting to {}@{} failed",
            params.user(),
            params.host_or_default()
        ))?;

        let sql_mode: Option<String> = conn
            .query_first("SELECT @@SESSION.sql_mode")
            .map_err(Error::from)?;
        let escaper = sql_mode
            .as_deref()
            .map(Escaper::from_sql_mode)
            .unwrap_or_default();

        Ok(MysqlConnection { conn, escaper })
    }
}

impl SqlConnection for MysqlConnection {
    fn select_database(&mut self, name: &str) -> Result<()> {
        self.execute(&format!("USE {}", quote_identifier(name)))
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn
            .query_drop(sql)
            .map_err(|e| Error::query(sql, e.to_string()))
    }

    fn for_each_row(
        &mut self,
        sql: &str,
        f: &mut dyn FnMut(SqlRow) -> Result<()>,
    ) -> Result<()> {
        let result = self
            .conn
            .query_iter(sql)
            .map_err(|e| Error::query(sql, e.to_string()))?;
        for row in result {
            let row = row.map_err(|e| Error::query(sql, e.to_string()))?;
            f(::mysql::Row::unwrap(row).into_iter().map(into_sql_value).collect())?;
        }
        Ok(())
    }

    fn escaper(&self) -> Escaper {
        self.escaper
    }
}

/// The text protocol sends `NULL` or bytes; the other variants only show up
/// with prepared statements and are rendered in their SQL spelling.
fn into_sql_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(bytes),
        Value::Int(i) => Some(i.to_string().into_bytes()),
        Value::UInt(u) => Some(u.to_string().into_bytes()),
        Value::Float(f) => Some(f.to_string().into_bytes()),
        Value::Double(d) => Some(d.to_string().into_bytes()),
        other => Some(other.as_sql(false).trim_matches('\'').as_bytes().to_vec()),
    }
}
