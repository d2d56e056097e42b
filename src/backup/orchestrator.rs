use crate::backup::archive::tree::TreeArchiver;
use crate::backup::archive::zip_sink::{ArchiveHandle, ZipSink};
use crate::backup::archive::ArchiveSink;
use crate::backup::database::connection::ConnectionCache;
use crate::backup::database::dump::{TableDumper, DEFAULT_CLIENT_ENCODING};
use crate::backup::database::Connector;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::rules::{DatabaseSpec, RuleSet};

use derive_more::Display;
use function_name::named;
use getset::Getters;

use std::path::Path;

/// What happened to one database spec during a run.
#[derive(Debug, Display)]
pub enum DatabaseStatus {
    #[display("dumped into {entry} ({bytes} bytes)")]
    Dumped { entry: String, bytes: usize },
    /// No usable connection; nothing was attempted.
    #[display("skipped: {_0}")]
    Skipped(Error),
    #[display("failed: {_0}")]
    Failed(Error),
}

#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct DatabaseOutcome {
    name: String,
    status: DatabaseStatus,
}

impl DatabaseOutcome {
    pub fn is_dumped(&self) -> bool {
        matches!(self.status, DatabaseStatus::Dumped { .. })
    }
}

/// Per-run results that outlive the archive handle.
#[derive(Debug, Default, Getters)]
#[getset(get = "pub")]
pub struct BackupSummary {
    files: usize,
    databases: Vec<DatabaseOutcome>,
}

impl BackupSummary {
    /// Databases that were skipped or failed, with the reason.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.databases.iter().filter_map(|o| match &o.status {
            DatabaseStatus::Skipped(e) | DatabaseStatus::Failed(e) => {
                Some((o.name.as_str(), e))
            }
            DatabaseStatus::Dumped { .. } => None,
        })
    }
}

/// A finalized archive plus the record of what went into it.
#[derive(Debug)]
pub struct BackupReport {
    pub archive: ArchiveHandle,
    pub summary: BackupSummary,
}

fn named_specs(rules: &RuleSet) -> impl Iterator<Item = &DatabaseSpec> {
    rules.databases().iter().filter(|spec| !spec.name().is_empty())
}

/// `<databaseName>.sql`
pub fn sql_entry_name(database: &str) -> String {
    format!("{database}.sql")
}

/// Builds one archive: the file tree first, then one SQL entry per database.
///
/// File tree and archive errors end the run with no archive. Database errors
/// are recorded in the summary and the run goes on with the next spec.
pub struct BackupOrchestrator<C: Connector> {
    connections: ConnectionCache<C>,
    client_encoding: String,
}

impl<C: Connector> BackupOrchestrator<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connections: ConnectionCache::new(connector),
            client_encoding: DEFAULT_CLIENT_ENCODING.to_string(),
        }
    }

    pub fn with_client_encoding<S: Into<String>>(mut self, client_encoding: S) -> Self {
        self.client_encoding = client_encoding.into();
        self
    }

    pub fn connections(&self) -> &ConnectionCache<C> {
        &self.connections
    }

    pub fn run(
        &mut self,
        rules: &RuleSet,
        root: &Path,
        temp_dir: &Path,
    ) -> Result<BackupReport> {
        tracing::info!("Starting backup of {:?}", root);
        let mut sink = ZipSink::create_in(temp_dir)?;
        let summary = self.fill(rules, root, &mut sink)?;

        let archive = sink.finish()?;
        tracing::info!(
            "Backup finished: {} files, {} of {} databases",
            summary.files,
            summary.databases.iter().filter(|d| d.is_dumped()).count(),
            summary.databases.len()
        );
        Ok(BackupReport { archive, summary })
    }

    /// Writes the file tree and every database dump into `sink`.
    ///
    /// Connections opened on the way are closed before this returns, on
    /// success and on error alike.
    pub fn fill<S: ArchiveSink>(
        &mut self,
        rules: &RuleSet,
        root: &Path,
        sink: &mut S,
    ) -> Result<BackupSummary> {
        let summary = self.fill_entries(rules, root, sink);
        self.connections.close();
        summary
    }

    #[named]
    fn fill_entries<S: ArchiveSink>(
        &mut self,
        rules: &RuleSet,
        root: &Path,
        sink: &mut S,
    ) -> Result<BackupSummary> {
        // Dumps are written last but own their names.
        let mut named = 0;
        for spec in named_specs(rules) {
            sink.reserve(&sql_entry_name(spec.name()));
            named += 1;
        }
        if named < rules.databases().len() {
            tracing::debug!(
                "Skipping {} database specs without a name",
                rules.databases().len() - named
            );
        }

        let files = TreeArchiver::new(root, rules)
            .build(&mut *sink)
            .with_msg(format!("Archiving file tree {:?} failed", root))?;

        let mut databases = Vec::new();
        for spec in named_specs(rules) {
            let status = self
                .dump_into(spec, sink)
                .with_debug_object_and_fn_name(spec.name().clone(), function_path!())?;
            databases.push(DatabaseOutcome {
                name: spec.name().clone(),
                status,
            });
        }
        Ok(BackupSummary { files, databases })
    }

    /// Dumps one database into `sink`. Only archive write errors are returned
    /// as errors; database problems and name clashes become a status.
    fn dump_into<S: ArchiveSink>(
        &mut self,
        spec: &DatabaseSpec,
        sink: &mut S,
    ) -> Result<DatabaseStatus> {
        let dumper = TableDumper::new(&self.client_encoding);
        let script = self
            .connections
            .activate(spec)
            .and_then(|conn| dumper.dump(conn, spec));

        match script {
            Ok(script) => {
                let entry = sql_entry_name(spec.name());
                match sink.add_entry_from_text(&entry, &script) {
                    Ok(()) => {}
                    Err(e @ Error::DuplicateEntry(_)) => {
                        tracing::warn!("Dump of database {:?} not stored: {}", spec.name(), e);
                        return Ok(DatabaseStatus::Failed(e));
                    }
                    Err(e) => return Err(e),
                }
                tracing::info!("Added database {:?} as {}", spec.name(), entry);
                Ok(DatabaseStatus::Dumped {
                    entry,
                    bytes: script.len(),
                })
            }
            Err(e) if e.is_no_connection() => {
                tracing::warn!("Can't back up database {:?}: {}", spec.name(), e);
                Ok(DatabaseStatus::Skipped(e))
            }
            Err(e) => {
                tracing::warn!("Backup of database {:?} failed:\n{}", spec.name(), e);
                Ok(DatabaseStatus::Failed(e))
            }
        }
    }
}
