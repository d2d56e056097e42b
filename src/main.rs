use clap::Parser;
use site_backup::backup::backup_config::BackupConfig;
use site_backup::backup::database::mysql::MysqlConnector;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};

/// Archive a site's files and MySQL databases into one zip
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,
}

fn main() {
    // stdout may carry the archive itself.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();

    let res = BackupConfig::from_yaml_file(&args.config)
        .and_then(|bc| bc.create_backup(MysqlConnector));

    match res {
        Ok((delivered, summary)) => {
            for (database, e) in summary.warnings() {
                warn!("Database {database:?} not in archive: {e}");
            }
            info!("Archive {delivered}, {} files", summary.files());
        }
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
