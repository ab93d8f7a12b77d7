//! Append-only JSON-Lines persistence.
//!
//! Both log surfaces of the bench — the server's request log and the
//! client's trial log — are JSONL files: one self-contained JSON object per
//! line, no cross-line references, safe to tail or replay independently.
//! The writer serializes concurrent appenders so lines never interleave.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Serialized single-writer for one append-only JSONL file.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single line.
    ///
    /// The lock is held across the whole append so concurrent completions
    /// cannot interleave partial lines. Write order is therefore completion
    /// order of the callers, not their arrival order.
    pub async fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Reads a whole JSONL file back into records.
///
/// Blank lines are skipped; a malformed line is a parse error, not a skip.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("samples.jsonl");
        let writer = JsonlWriter::new(&path);

        for id in 1..=3 {
            writer
                .append(&Sample {
                    id,
                    name: format!("Item {id}"),
                })
                .await
                .unwrap();
        }

        let records: Vec<Sample> = read_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[2].name, "Item 3");
    }

    #[tokio::test]
    async fn concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concurrent.jsonl");
        let writer = std::sync::Arc::new(JsonlWriter::new(&path));

        let mut handles = Vec::new();
        for id in 0..32u32 {
            let w = writer.clone();
            handles.push(tokio::spawn(async move {
                w.append(&Sample {
                    id,
                    name: "x".repeat(64),
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every line must parse on its own.
        let records: Vec<Sample> = read_records(&path).unwrap();
        assert_eq!(records.len(), 32);
    }

    #[test]
    fn read_missing_file_is_an_error() {
        let err = read_records::<Sample>(Path::new("/nonexistent/samples.jsonl")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
