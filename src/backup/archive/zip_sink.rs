use crate::backup::archive::ArchiveSink;
use crate::backup::finish::Finish;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;

use getset::{CopyGetters, Getters};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

static TEMP_PREFIX: &str = "bkp";
static TEMP_SUFFIX: &str = ".zip";

/// Zip archive written to a fresh temporary file.
///
/// A file whose name is already written or reserved is skipped. A text entry
/// may take a reserved name but never a written one.
pub struct ZipSink {
    writer: ZipWriter<NamedTempFile>,
    written: HashSet<String>,
    reserved: HashSet<String>,
}

/// A finalized archive still sitting in temporary storage.
///
/// The file is removed when the handle is dropped, unless a delivery takes it
/// over first.
#[derive(Debug, Getters, CopyGetters)]
pub struct ArchiveHandle {
    #[getset(get = "pub")]
    file: NamedTempFile,
    #[getset(get_copy = "pub")]
    size: u64,
    #[getset(get_copy = "pub")]
    entries: usize,
}

impl ArchiveHandle {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn into_file(self) -> NamedTempFile {
        self.file
    }
}

impl ZipSink {
    /// Opens a new archive backed by a temporary file in `temp_dir`.
    pub fn create_in<P: AsRef<Path>>(temp_dir: P) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(temp_dir.as_ref())
            .map_err(Error::from)
            .with_msg(format!(
                "Creating temporary archive in {:?} failed",
                temp_dir.as_ref()
            ))?;
        tracing::debug!("Writing archive to {:?}", file.path());
        Ok(Self {
            writer: ZipWriter::new(file),
            written: HashSet::new(),
            reserved: HashSet::new(),
        })
    }

    /// Writes the central directory and closes the archive.
    pub fn finish(self) -> Result<ArchiveHandle> {
        let entries = self.written.len();
        let file = Finish::finish(self.writer)
            .map_err(Error::from)
            .with_msg("Finalizing archive failed")?;
        let size = file.as_file().metadata()?.len();
        tracing::info!(
            "Archive {:?} finalized with {} entries, {} bytes",
            file.path(),
            entries,
            size
        );
        Ok(ArchiveHandle {
            file,
            size,
            entries,
        })
    }

    fn options(len: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(len >= u64::from(u32::MAX))
    }
}

impl ArchiveSink for ZipSink {
    fn reserve(&mut self, entry_name: &str) {
        if !self.written.contains(entry_name) {
            self.reserved.insert(entry_name.to_string());
        }
    }

    fn add_file(&mut self, src: &Path, entry_name: &str) -> Result<bool> {
        if self.written.contains(entry_name) || self.reserved.contains(entry_name) {
            tracing::debug!("Skipping {:?}, entry {:?} already taken", src, entry_name);
            return Ok(false);
        }
        let mut file = File::open(src)?;
        let metadata = file.metadata()?;
        let options = Self::options(metadata.len());
        #[cfg(unix)]
        let options = {
            use std::os::unix::fs::PermissionsExt;
            options.unix_permissions(metadata.permissions().mode())
        };

        self.writer.start_file(entry_name, options)?;
        std::io::copy(&mut file, &mut self.writer)?;
        self.written.insert(entry_name.to_string());
        Ok(true)
    }

    fn add_entry_from_text(&mut self, entry_name: &str, content: &str) -> Result<()> {
        if self.written.contains(entry_name) {
            return Err(Error::DuplicateEntry(entry_name.to_string()));
        }
        let options = Self::options(content.len() as u64);
        self.writer.start_file(entry_name, options)?;
        self.writer.write_all(content.as_bytes())?;
        self.reserved.remove(entry_name);
        self.written.insert(entry_name.to_string());
        Ok(())
    }
}
