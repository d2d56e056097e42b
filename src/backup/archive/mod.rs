pub mod tree;
pub mod zip_sink;

use crate::backup::result_error::result::Result;
use std::path::{Path, PathBuf};

/// A file accepted by the tree walk, waiting to be written to the archive.
///
/// `name` is the entry name inside the archive: root-relative, `/`-separated,
/// without a leading slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub src: PathBuf,
    pub name: String,
}

impl ArchiveEntry {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(src: P, name: S) -> ArchiveEntry {
        Self {
            src: src.into(),
            name: name.into(),
        }
    }
}

/// Destination container collecting file entries and in-memory text entries.
///
/// Directories are never stored as entries of their own. Entry names are
/// unique within one archive.
pub trait ArchiveSink {
    /// Holds `entry_name` for a later text entry, so a file of the same name
    /// does not take it first.
    fn reserve(&mut self, _entry_name: &str) {}

    /// Copies the file at `src` into the archive as `entry_name`.
    ///
    /// Returns `false` when the name is already taken and the file was
    /// skipped.
    fn add_file(&mut self, src: &Path, entry_name: &str) -> Result<bool>;

    /// Stores `content` as `entry_name`.
    fn add_entry_from_text(&mut self, entry_name: &str, content: &str) -> Result<()>;
}

impl<T: ArchiveSink + ?Sized> ArchiveSink for &mut T {
    fn reserve(&mut self, entry_name: &str) {
        (**self).reserve(entry_name)
    }

    fn add_file(&mut self, src: &Path, entry_name: &str) -> Result<bool> {
        (**self).add_file(src, entry_name)
    }

    fn add_entry_from_text(&mut self, entry_name: &str, content: &str) -> Result<()> {
        (**self).add_entry_from_text(entry_name, content)
    }
}

/// Sink that only remembers what it was given.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub files: Vec<ArchiveEntry>,
    pub texts: Vec<(String, String)>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|e| e.name.as_str()).collect()
    }
}

#[cfg(test)]
impl ArchiveSink for RecordingSink {
    fn add_file(&mut self, src: &Path, entry_name: &str) -> Result<bool> {
        self.files.push(ArchiveEntry::new(src, entry_name));
        Ok(true)
    }

    fn add_entry_from_text(&mut self, entry_name: &str, content: &str) -> Result<()> {
        self.texts.push((entry_name.to_string(), content.to_string()));
        Ok(())
    }
}
