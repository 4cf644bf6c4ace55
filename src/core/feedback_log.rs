//! Append-only clinician feedback log (JSONL).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::info;

use crate::domain::FeedbackRecord;

/// Feedback log stored at `$CIDLENS_HOME/feedback.jsonl`
#[derive(Debug, Clone)]
pub struct FeedbackLog {
    path: PathBuf,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record under an exclusive file lock
    pub fn append(&self, record: &FeedbackRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open feedback log: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire file lock on feedback log")?;

        let json = serde_json::to_string(record).context("Failed to serialize feedback")?;
        writeln!(file, "{}", json).context("Failed to write feedback")?;
        file.flush().context("Failed to flush feedback")?;

        info!(code = %record.code, verdict = record.verdict.as_str(), "Feedback recorded");

        // Lock is released when file is dropped
        Ok(())
    }

    /// Read all records, oldest first
    pub fn load(&self) -> Result<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open feedback log: {}", self.path.display()))?;

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: FeedbackRecord = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse feedback line: {}", line))?;
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verdict;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_load() {
        let temp = TempDir::new().unwrap();
        let log = FeedbackLog::new(temp.path().join("nested").join("feedback.jsonl"));

        log.append(&FeedbackRecord::new("I10", Verdict::Correct, Some("nota")))
            .unwrap();
        log.append(&FeedbackRecord::new("E11.9", Verdict::Incorrect, None))
            .unwrap();

        let records = log.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "I10");
        assert_eq!(records[1].verdict, Verdict::Incorrect);
    }

    #[test]
    fn test_load_missing_log() {
        let temp = TempDir::new().unwrap();
        let log = FeedbackLog::new(temp.path().join("feedback.jsonl"));
        assert!(log.load().unwrap().is_empty());
    }
}
