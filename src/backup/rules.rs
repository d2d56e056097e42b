//! Selection rules for one backup run: which parts of the file tree go into
//! the archive and which databases get dumped next to them.

use crate::backup::redacted::RedactedString;
use bon::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashSet;

/// Exclude entry that turns the file tree walk off completely.
pub static EXCLUDE_ALL: &str = "*";

pub static DEFAULT_HOST: &str = "localhost";

/// Filesystem and database selection rules.
///
/// Every `add_*` operation appends only when the value is not already
/// present, so building the same rules twice yields the same set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(from = "RuleSetDef", into = "RuleSetDef")]
#[getset(get = "pub")]
pub struct RuleSet {
    /// Root-relative paths skipped during the walk.
    exclude: HashSet<String>,
    /// Root-relative subtrees to walk; the whole root when empty.
    include: Vec<String>,
    /// Bare names skipped in every directory.
    ignored_names: HashSet<String>,
    databases: Vec<DatabaseSpec>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exclude_path<S: Into<String>>(&mut self, path: S) -> &mut Self {
        self.exclude.insert(path.into());
        self
    }

    pub fn add_include_path<S: Into<String>>(&mut self, path: S) -> &mut Self {
        let path = path.into();
        if !self.include.contains(&path) {
            self.include.push(path);
        }
        self
    }

    pub fn add_ignored_name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.ignored_names.insert(name.into());
        self
    }

    pub fn add_database(&mut self, spec: DatabaseSpec) -> &mut Self {
        if !self.databases.contains(&spec) {
            self.databases.push(spec);
        }
        self
    }

    /// True when the `"*"` sentinel suppresses the file tree walk.
    pub fn excludes_all_files(&self) -> bool {
        self.exclude.contains(EXCLUDE_ALL)
    }

    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude.contains(relative_path)
    }

    pub fn is_ignored_name(&self, name: &str) -> bool {
        self.ignored_names.contains(name)
    }
}

/// Serialized shape of a [`RuleSet`]. Deserialization goes through the
/// `add_*` operations so duplicates in a config file collapse.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSetDef {
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    ignored_names: Vec<String>,
    #[serde(default)]
    databases: Vec<DatabaseSpec>,
}

impl From<RuleSetDef> for RuleSet {
    fn from(def: RuleSetDef) -> Self {
        let mut rules = RuleSet::new();
        def.exclude.into_iter().for_each(|p| {
            rules.add_exclude_path(p);
        });
        def.include.into_iter().for_each(|p| {
            rules.add_include_path(p);
        });
        def.ignored_names.into_iter().for_each(|n| {
            rules.add_ignored_name(n);
        });
        def.databases.into_iter().for_each(|d| {
            rules.add_database(d);
        });
        rules
    }
}

impl From<RuleSet> for RuleSetDef {
    fn from(rules: RuleSet) -> Self {
        let mut exclude: Vec<_> = rules.exclude.into_iter().collect();
        exclude.sort();
        let mut ignored_names: Vec<_> = rules.ignored_names.into_iter().collect();
        ignored_names.sort();
        Self {
            exclude,
            include: rules.include,
            ignored_names,
            databases: rules.databases,
        }
    }
}

/// One database to export as `<name>.sql`.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct DatabaseSpec {
    /// Specs with an empty name are skipped without a warning.
    #[builder(into)]
    name: String,
    /// Reuses the active connection when absent.
    connection: Option<ConnectionParams>,
    /// Restricts the dump to these tables when non-empty.
    #[serde(default)]
    #[builder(default, into)]
    include_tables: Vec<String>,
    #[serde(default)]
    #[builder(default, into)]
    exclude_tables: Vec<String>,
}

impl DatabaseSpec {
    /// Connection parameters that actually open a new connection. Parameters
    /// missing a user or a password fall back to the active connection.
    pub fn override_params(&self) -> Option<&ConnectionParams> {
        self.connection.as_ref().filter(|c| c.is_complete())
    }

    /// Applies the table filters to the tables found in the database, keeping
    /// the server's order.
    pub fn select_tables(&self, available: Vec<String>) -> Vec<String> {
        available
            .into_iter()
            .filter(|t| self.include_tables.is_empty() || self.include_tables.contains(t))
            .filter(|t| !self.exclude_tables.contains(t))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct ConnectionParams {
    #[serde(default = "default_host")]
    #[builder(default = default_host(), into)]
    host: String,
    #[serde(default)]
    #[builder(default, into)]
    user: String,
    #[serde(default)]
    #[builder(default, into)]
    password: RedactedString,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl ConnectionParams {
    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }

    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }
}
