//! NDJSON (Newline Delimited JSON) table snapshots
//!
//! One record per line, in extraction order.

use crate::client::Record;

use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Read a table snapshot from an NDJSON file
pub struct NdjsonReader {
    path: PathBuf,
}

impl NdjsonReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read all lines as records
    ///
    /// Blank lines are skipped; a line that is not a JSON object is an error.
    pub fn read(&self) -> Result<Vec<Record>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read NDJSON file: {}", self.path.display()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Line {} of {} is not a JSON object", n + 1, self.path.display())
                })
            })
            .collect()
    }
}

/// Write a table snapshot to an NDJSON file
pub struct NdjsonWriter {
    path: PathBuf,
}

impl NdjsonWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write records as NDJSON, replacing any existing file
    pub fn write(&self, records: &[Record]) -> Result<()> {
        let ndjson = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        // Add trailing newline
        let content = if ndjson.is_empty() {
            String::new()
        } else {
            format!("{}\n", ndjson)
        };

        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))?;

        Ok(())
    }
}
