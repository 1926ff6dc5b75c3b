//! Flat CSV relations.
//!
//! Row-level and repo-level tables are written as CSV so they can be opened
//! by any downstream tool. Writes go through [`atomic_write_bytes`].

use super::atomic::atomic_write_bytes;
use crate::{HublinkError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Fail fast when a stage input is missing.
///
/// `producer` is the subcommand that creates the file and ends up in the
/// diagnostic.
pub fn require_input(path: &Path, producer: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(HublinkError::missing_artifact(path, producer))
    }
}

/// Read every record of a CSV file.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| HublinkError::Csv {
            message: format!("Failed to open {}: {}", path.display(), e),
            source: Some(e),
        })?;

    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| HublinkError::Csv {
                message: format!("Failed to read {}: {}", path.display(), e),
                source: Some(e),
            })
        })
        .collect()
}

/// Serialize `rows` as CSV (with a header) and atomically replace `path`.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| HublinkError::Io {
        message: format!("Failed to buffer {}: {}", path.display(), e),
        path: Some(path.to_path_buf()),
        source: None,
    })?;

    atomic_write_bytes(path, &bytes)
}
