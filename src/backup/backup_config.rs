use crate::backup::database::dump::DEFAULT_CLIENT_ENCODING;
use crate::backup::database::Connector;
use crate::backup::delivery::{
    archive_file_name, Delivered, Delivery, DeliveryConfig, DEFAULT_ARCHIVE_NAME_MASK,
};
use crate::backup::function_path;
use crate::backup::orchestrator::{BackupOrchestrator, BackupSummary};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::rules::RuleSet;
use crate::backup::validate::{
    validate_archive_name_mask, validate_client_encoding, validate_dir_exist,
    validate_writable_dir,
};

use chrono::{Local, NaiveDate};
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;

use std::fs::File;
use std::path::{Path, PathBuf};

/// Everything one backup run needs, as read from a YAML file.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    /// Directory that becomes the root of the archive.
    #[validate(custom(function = validate_dir_exist))]
    root: PathBuf,
    /// Where the archive is assembled; the OS temp dir when absent.
    #[validate(custom(function = validate_writable_dir))]
    temp_dir: Option<PathBuf>,
    #[serde(default = "default_archive_name_mask")]
    #[validate(custom(function = validate_archive_name_mask))]
    archive_name_mask: String,
    #[serde(default = "default_client_encoding")]
    #[validate(custom(function = validate_client_encoding))]
    client_encoding: String,
    #[serde(default)]
    rules: RuleSet,
    /// Validated separately, see [`BackupConfig::validate_all`].
    delivery: DeliveryConfig,
}

fn default_archive_name_mask() -> String {
    DEFAULT_ARCHIVE_NAME_MASK.to_string()
}

fn default_client_encoding() -> String {
    DEFAULT_CLIENT_ENCODING.to_string()
}

impl BackupConfig {
    /// Reads and validates a YAML config file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Open config failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|bc| {
                bc.validate_all()
                    .map(|_| bc)
                    .with_msg(format!("Config validation failed: {:?}", path))
            })
    }

    /// Field checks plus the delivery target.
    pub fn validate_all(&self) -> Result<()> {
        let errors = [self.validate(), self.delivery.validate()]
            .into_iter()
            .filter_map(|r| r.err().map(Error::from))
            .collect::<Vec<_>>();
        convert_error_vec(errors)
    }

    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn archive_file_name(&self, date: NaiveDate) -> String {
        archive_file_name(&self.archive_name_mask, date)
    }

    /// Builds the archive with `connector` for databases and hands it to the
    /// configured delivery.
    #[named]
    pub fn create_backup<C: Connector>(&self, connector: C) -> Result<(Delivered, BackupSummary)> {
        let report = BackupOrchestrator::new(connector)
            .with_client_encoding(self.client_encoding.as_str())
            .run(&self.rules, &self.root, &self.resolved_temp_dir())
            .with_debug_object_and_fn_name(self.root.clone(), function_path!())?;

        let file_name = self.archive_file_name(Local::now().date_naive());
        let delivered = self
            .delivery
            .clone()
            .deliver(report.archive, &file_name)
            .with_msg(format!("Delivering {} failed", file_name))?;
        Ok((delivered, report.summary))
    }
}
