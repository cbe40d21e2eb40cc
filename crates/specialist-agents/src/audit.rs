//! Append-only JSON-lines audit log of consolidated results.
//!
//! One line per request. Lines are never rewritten; `read_all` reports the
//! first malformed line with its number.

use chrono::{DateTime, Utc};
use coordination::{ConsolidatedResult, TaskId};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit log {} line {line} is malformed: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub request_id: Uuid,
    pub task_id: TaskId,
    pub recorded_at: DateTime<Utc>,
    pub result: ConsolidatedResult,
}

impl AuditEntry {
    pub fn new(result: ConsolidatedResult) -> Self {
        Self {
            request_id: result.request_id,
            task_id: result.task_id.clone(),
            recorded_at: Utc::now(),
            result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> AuditError {
        AuditError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Append one entry, creating the file and its parent directory if needed.
    pub fn append(&self, result: &ConsolidatedResult) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry::new(result.clone());
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), request_id = %entry.request_id, "Appended audit entry");
        Ok(entry)
    }

    /// Every entry in file order. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|source| AuditError::Corrupt {
                path: self.path.clone(),
                line: idx + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::default_registry;
    use coordination::{Context, EscalationEngine, FixedDomain, Domain, Task};

    async fn result(id: &str) -> ConsolidatedResult {
        let engine = EscalationEngine::new(
            default_registry().unwrap(),
            FixedDomain(Domain::new("security")),
        );
        engine
            .consult(&Task::new(id, "simple login form"), &Context::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("nested/audit.jsonl"));

        let first = log.append(&result("t-1").await).unwrap();
        log.append(&result("t-2").await).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], first);
        assert_eq!(entries[1].task_id.as_str(), "t-2");
        assert_eq!(entries[1].result.chain.len(), 1);
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("none.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("audit.jsonl"));
        log.append(&result("t-1").await).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"{not json}\n")
            .unwrap();

        let err = log.read_all().unwrap_err();
        assert!(matches!(err, AuditError::Corrupt { line: 2, .. }), "{err}");
    }
}
