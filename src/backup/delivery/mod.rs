//! Handing a finished archive over to whoever asked for it, under a name
//! built from the archive name mask.

use crate::backup::archive::zip_sink::ArchiveHandle;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_dir_exist_or_created;

use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::result;

pub static DATE_PLACEHOLDER: &str = "%DATE%";
pub static DATE_FORMAT: &str = "%Y.%m.%d";
pub static DEFAULT_ARCHIVE_NAME_MASK: &str = "backup_%DATE%.zip";

/// Substitutes every `%DATE%` in `mask` with `date` as `YYYY.MM.DD`.
pub fn archive_file_name(mask: &str, date: NaiveDate) -> String {
    mask.replace(DATE_PLACEHOLDER, &date.format(DATE_FORMAT).to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Delivered {
    #[display("stored as {_0:?}")]
    Stored(PathBuf),
    #[display("streamed {bytes} bytes as {file_name}")]
    Streamed { file_name: String, bytes: u64 },
}

/// Transfers a finished archive. The temporary file is gone afterwards,
/// whether the transfer worked or not.
pub trait Delivery {
    fn deliver(&mut self, archive: ArchiveHandle, file_name: &str) -> Result<Delivered>;
}

/// Moves archives into a directory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DirectoryDelivery {
    pub out_dir: PathBuf,
}

impl Validate for DirectoryDelivery {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_dir_exist_or_created(&self.out_dir) {
            errors.add("out_dir", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Delivery for DirectoryDelivery {
    fn deliver(&mut self, archive: ArchiveHandle, file_name: &str) -> Result<Delivered> {
        let target = self.out_dir.join(file_name);
        match archive.into_file().persist(&target) {
            Ok(_) => {}
            Err(e) => {
                // Rename fails across filesystems; copy instead.
                tracing::debug!("Renaming into {:?} failed ({}), copying", target, e.error);
                std::fs::copy(e.file.path(), &target)
                    .map_err(Error::from)
                    .with_msg(format!("Copying archive to {:?} failed", target))?;
            }
        }
        tracing::info!("Archive stored as {:?}", target);
        Ok(Delivered::Stored(target))
    }
}

/// Streams archives into a writer, e.g. a response body or stdout.
pub struct WriterDelivery<W: Write> {
    writer: W,
}

impl<W: Write> WriterDelivery<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Delivery for WriterDelivery<W> {
    fn deliver(&mut self, archive: ArchiveHandle, file_name: &str) -> Result<Delivered> {
        let mut file = archive.file().reopen()?;
        let mut writer = BufWriter::new(&mut self.writer);
        let bytes = std::io::copy(&mut file, &mut writer)?;
        writer.flush()?;
        tracing::info!("Streamed {} bytes of {}", bytes, file_name);
        Ok(Delivered::Streamed {
            file_name: file_name.to_string(),
            bytes,
        })
    }
}

/// Where the binary sends the archive.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum DeliveryConfig {
    Directory(DirectoryDelivery),
    Stdout,
}

impl Validate for DeliveryConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            DeliveryConfig::Directory(inner) => inner.validate(),
            DeliveryConfig::Stdout => Ok(()),
        }
    }
}

impl Delivery for DeliveryConfig {
    fn deliver(&mut self, archive: ArchiveHandle, file_name: &str) -> Result<Delivered> {
        match self {
            DeliveryConfig::Directory(inner) => inner.deliver(archive, file_name),
            DeliveryConfig::Stdout => {
                WriterDelivery::new(std::io::stdout().lock()).deliver(archive, file_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::zip_sink::ZipSink;
    use crate::backup::archive::ArchiveSink;
    use tempfile::TempDir;

    fn archive_in(dir: &TempDir) -> ArchiveHandle {
        let mut sink = ZipSink::create_in(dir.path()).unwrap();
        sink.add_entry_from_text("shop.sql", "SET NAMES utf8;").unwrap();
        sink.finish().unwrap()
    }

    #[test]
    fn test_archive_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            archive_file_name(DEFAULT_ARCHIVE_NAME_MASK, date),
            "backup_2024.03.07.zip"
        );
        assert_eq!(
            archive_file_name("%DATE%-site-%DATE%.zip", date),
            "2024.03.07-site-2024.03.07.zip"
        );
        assert_eq!(archive_file_name("site.zip", date), "site.zip");
    }

    #[test]
    fn test_directory_delivery_moves_archive() {
        let temp = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let archive = archive_in(&temp);
        let size = archive.size();
        let temp_path = archive.path().to_path_buf();

        let mut delivery = DirectoryDelivery {
            out_dir: out.path().to_path_buf(),
        };
        let delivered = delivery.deliver(archive, "backup.zip").unwrap();

        let target = out.path().join("backup.zip");
        assert_eq!(delivered, Delivered::Stored(target.clone()));
        assert_eq!(std::fs::metadata(&target).unwrap().len(), size);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_writer_delivery_streams_and_removes_temp_file() {
        let temp = TempDir::new().unwrap();
        let archive = archive_in(&temp);
        let size = archive.size();
        let temp_path = archive.path().to_path_buf();

        let mut delivery = WriterDelivery::new(Vec::new());
        let delivered = delivery.deliver(archive, "backup.zip").unwrap();

        assert_eq!(
            delivered,
            Delivered::Streamed {
                file_name: "backup.zip".to_string(),
                bytes: size
            }
        );
        let bytes = delivery.into_inner();
        assert_eq!(bytes.len() as u64, size);
        assert!(bytes.starts_with(b"PK\x03\x04"));
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_delivery_config_deserialize() {
        let config: DeliveryConfig =
            serde_yml::from_str("type: directory\nout_dir: /var/backups\n").unwrap();
        assert_eq!(
            config,
            DeliveryConfig::Directory(DirectoryDelivery {
                out_dir: PathBuf::from("/var/backups")
            })
        );
        let config: DeliveryConfig = serde_yml::from_str("type: stdout\n").unwrap();
        assert_eq!(config, DeliveryConfig::Stdout);
    }
}
