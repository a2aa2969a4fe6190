//! Append-only JSON-lines record of executed statements.

use crate::error::BatchError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp_micros: u64,
    pub table: String,
    pub kind: String,
    pub sql: String,
    pub status: AuditStatus,
    pub duration_micros: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct StatementAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl StatementAuditLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, entry: &AuditEntry) -> Result<(), BatchError> {
        let mut line =
            serde_json::to_string(entry).map_err(|e| BatchError::Decode(e.to_string()))?;
        line.push('\n');
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, BatchError> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries
                .push(serde_json::from_str(&line).map_err(|e| BatchError::Decode(e.to_string()))?);
        }
        Ok(entries)
    }
}

pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Cuts `sql` to at most `max_chars` characters, marking the cut with `...`.
pub(crate) fn sql_preview(sql: &str, max_chars: usize) -> Cow<'_, str> {
    match sql.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &sql[..cut])),
        None => Cow::Borrowed(sql),
    }
}
