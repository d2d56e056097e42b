//! # site-backup
//!
//! Packs a website's file tree and its MySQL databases into a single zip
//! archive.
//!
//! ## Features
//!
//! - **File tree**: sorted walk of a root directory with exclude paths,
//!   include paths and ignored file names
//! - **Databases**: `CREATE TABLE` and multi-row `INSERT` scripts, one
//!   `<database>.sql` entry per database
//! - **Connection reuse**: databases without credentials share the last
//!   opened connection
//! - **Delivery**: into a directory or streamed to stdout, named after a
//!   `%DATE%` mask
//!
//! ## Quick Start
//!
//! ```no_run
//! use site_backup::backup::backup_config::BackupConfig;
//! use site_backup::backup::database::mysql::MysqlConnector;
//!
//! let config = BackupConfig::from_yaml_file("config.yml")?;
//! let (delivered, summary) = config.create_backup(MysqlConnector)?;
//! println!("{delivered}, {} files", summary.files());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
