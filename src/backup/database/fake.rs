//! In-memory stand-in for a MySQL server answering exactly the statements the
//! dumper sends.

use crate::backup::database::{Connector, SqlConnection, SqlRow};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::rules::ConnectionParams;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub create: String,
    pub columns: Vec<(String, String)>,
    pub rows: Vec<SqlRow>,
}

impl FakeTable {
    pub fn new(create: &str, columns: &[(&str, &str)]) -> Self {
        Self {
            create: create.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(self, values: &[Option<&str>]) -> Self {
        self.raw_row(values.iter().map(|v| v.and_then(text)).collect())
    }

    pub fn raw_row(mut self, values: SqlRow) -> Self {
        self.rows.push(values);
        self
    }
}

pub type FakeDatabases = BTreeMap<String, BTreeMap<String, FakeTable>>;

/// Shared counters so tests can observe connection handling.
#[derive(Debug, Default)]
pub struct FakeStats {
    pub connects: Cell<usize>,
    pub closes: Cell<usize>,
    pub statements: RefCell<Vec<String>>,
}

#[derive(Debug)]
pub struct FakeConnection {
    host: String,
    databases: Rc<FakeDatabases>,
    current: Option<String>,
    failing_prefix: Option<String>,
    stats: Rc<FakeStats>,
}

impl FakeConnection {
    pub fn new(databases: FakeDatabases) -> Self {
        Self {
            host: "localhost".to_string(),
            databases: Rc::new(databases),
            current: None,
            failing_prefix: None,
            stats: Rc::default(),
        }
    }

    /// Every statement starting with `prefix` fails.
    pub fn failing_on<S: Into<String>>(mut self, prefix: S) -> Self {
        self.failing_prefix = Some(prefix.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn statements(&self) -> Vec<String> {
        self.stats.statements.borrow().clone()
    }

    fn record(&self, sql: &str) -> Result<()> {
        self.stats.statements.borrow_mut().push(sql.to_string());
        match &self.failing_prefix {
            Some(prefix) if sql.starts_with(prefix.as_str()) => {
                Err(Error::query(sql, "simulated failure"))
            }
            _ => Ok(()),
        }
    }

    fn table(&self, sql: &str) -> Result<&FakeTable> {
        let db = self
            .current
            .as_ref()
            .and_then(|name| self.databases.get(name))
            .ok_or_else(|| Error::query(sql, "No database selected"))?;
        last_identifier(sql)
            .and_then(|t| db.get(&t))
            .ok_or_else(|| Error::query(sql, "Table doesn't exist"))
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.stats.closes.set(self.stats.closes.get() + 1);
    }
}

fn last_identifier(sql: &str) -> Option<String> {
    let end = sql.rfind('`')?;
    let start = sql[..end].rfind('`')?;
    Some(sql[start + 1..end].to_string())
}

fn text(value: &str) -> Option<Vec<u8>> {
    Some(value.as_bytes().to_vec())
}

impl SqlConnection for FakeConnection {
    fn select_database(&mut self, name: &str) -> Result<()> {
        self.record(&format!("USE `{name}`"))?;
        if !self.databases.contains_key(name) {
            return Err(Error::query(
                format!("USE `{name}`"),
                format!("Unknown database '{name}'"),
            ));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.record(sql)
    }

    fn for_each_row(
        &mut self,
        sql: &str,
        f: &mut dyn FnMut(SqlRow) -> Result<()>,
    ) -> Result<()> {
        self.record(sql)?;
        let rows: Vec<SqlRow> = if sql == "SHOW TABLES" {
            let db = self
                .current
                .as_ref()
                .and_then(|name| self.databases.get(name))
                .ok_or_else(|| Error::query(sql, "No database selected"))?;
            db.keys().map(|t| vec![text(t)]).collect()
        } else if sql.starts_with("SHOW CREATE TABLE") {
            let table = self.table(sql)?;
            let name = last_identifier(sql).unwrap_or_default();
            vec![vec![text(&name), text(&table.create)]]
        } else if sql.starts_with("SHOW COLUMNS FROM") {
            self.table(sql)?
                .columns
                .iter()
                .map(|(n, t)| vec![text(n), text(t), text("YES"), text(""), None, text("")])
                .collect()
        } else if sql.starts_with("SELECT") {
            self.table(sql)?.rows.clone()
        } else {
            return Err(Error::query(sql, "unsupported statement"));
        };

        rows.into_iter().try_for_each(f)
    }
}

/// Hands out [`FakeConnection`]s for one password, like a server with a
/// single account.
#[derive(Debug)]
pub struct FakeConnector {
    databases: Rc<FakeDatabases>,
    password: String,
    pub stats: Rc<FakeStats>,
}

impl FakeConnector {
    pub fn new(databases: FakeDatabases, password: &str) -> Self {
        Self {
            databases: Rc::new(databases),
            password: password.to_string(),
            stats: Rc::default(),
        }
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    fn connect(&self, params: &ConnectionParams, database: &str) -> Result<FakeConnection> {
        if params.password().inner() != &self.password {
            return Err(Error::query(
                "connect",
                format!("Access denied for user '{}'", params.user()),
            ));
        }
        self.stats.connects.set(self.stats.connects.get() + 1);
        let mut conn = FakeConnection {
            host: params.host_or_default().to_string(),
            databases: self.databases.clone(),
            current: None,
            failing_prefix: None,
            stats: self.stats.clone(),
        };
        conn.select_database(database)?;
        Ok(conn)
    }
}

/// `shop` with a `users` table holding two rows and an empty `logs` table,
/// plus an empty `blog` database.
pub fn sample_databases() -> FakeDatabases {
    let users = FakeTable::new(
        "CREATE TABLE `users` (\n  `id` int(11) NOT NULL,\n  `name` varchar(50) DEFAULT NULL\n)",
        &[("id", "int(11)"), ("name", "varchar(50)")],
    )
    .row(&[Some("1"), Some("Al")])
    .row(&[Some("2"), Some("O'Reilly")]);
    let logs = FakeTable::new(
        "CREATE TABLE `logs` (\n  `line` text\n)",
        &[("line", "text")],
    );

    let mut shop = BTreeMap::new();
    shop.insert("users".to_string(), users);
    shop.insert("logs".to_string(), logs);

    let mut databases = BTreeMap::new();
    databases.insert("shop".to_string(), shop);
    databases.insert("blog".to_string(), BTreeMap::new());
    databases
}
