//! Validation functions for configuration values.
//!
//! Provides custom validation functions for the backup root, the temporary
//! directory, the archive name mask and the client encoding.

use crate::backup::delivery::archive_file_name;
use chrono::Local;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::Path;

pub fn validate_valid_archive_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    if name.as_ref().is_empty() || !is_sanitized(name.as_ref()) {
        return Err(ValidationError::new("InvalidArchiveName").with_message(
            format!(
                "Invalid file name {:?}, try sanitizing like {:?}",
                name.as_ref(),
                sanitize(name.as_ref())
            )
            .into(),
        ));
    }

    Ok(())
}

/// Checks the mask the way it will be used, with `%DATE%` already substituted.
pub fn validate_archive_name_mask<S: AsRef<str>>(mask: S) -> Result<(), ValidationError> {
    validate_valid_archive_name(archive_file_name(mask.as_ref(), Local::now().date_naive()))
}

/// `SET NAMES` takes the charset unquoted, so only plain charset names pass.
pub fn validate_client_encoding<S: AsRef<str>>(encoding: S) -> Result<(), ValidationError> {
    let encoding = encoding.as_ref();
    if encoding.is_empty()
        || !encoding
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ValidationError::new("InvalidClientEncoding")
            .with_message(format!("{:?} is not a charset name", encoding).into()));
    }

    Ok(())
}

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access directory {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    validate_dir_exist_or_created(dir)?;
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()))
    } else {
        Ok(())
    }
}
