//! Append-only journal storage.
//!
//! Each [`JournalMessage`] is one JSON line. Messages are flushed to disk one
//! at a time, so a crash loses at most the message being written. A final
//! line that was cut off mid-record (no trailing newline, JSON ends early) is
//! that lost message and is skipped on load. Any other unparsable line is a
//! hard error, including complete records of an unknown type.

use anyhow::{anyhow, Result};
use ignition_types::JournalMessage;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::paths::ensure_parent_dirs;

/// Journal backed by a `.jsonl` file.
pub struct FileJournal {
    path: PathBuf,
    // Serialize writes across threads to keep jsonl lines intact.
    write_lock: Mutex<()>,
}

impl FileJournal {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one message and sync it to disk.
    pub fn record(&self, message: &JournalMessage) -> Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| anyhow!("Failed to serialize journal message: {}", e))?;
        let _guard = self.write_lock.lock();
        ensure_parent_dirs(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| anyhow!("Failed to open journal {}: {}", self.path.display(), e))?;
        writeln!(file, "{}", json).map_err(|e| anyhow!("Failed to write journal: {}", e))?;
        file.sync_data()
            .map_err(|e| anyhow!("Failed to sync journal: {}", e))?;
        debug!(kind = message.type_name(), "journal message recorded");
        Ok(())
    }

    /// Read every message in order. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<JournalMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read journal {}: {}", self.path.display(), e))?;
        parse_journal(&contents, &self.path.display().to_string())
    }
}

/// Parse journal text, reporting the 1-based line of any invalid record.
pub fn parse_journal(contents: &str, source: &str) -> Result<Vec<JournalMessage>> {
    let torn_tail = !contents.is_empty() && !contents.ends_with('\n');
    let lines: Vec<&str> = contents.lines().collect();
    let mut messages = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalMessage>(line) {
            Ok(message) => messages.push(message),
            Err(e) if torn_tail && idx + 1 == lines.len() && e.is_eof() => {
                warn!(
                    source,
                    line = idx + 1,
                    error = %e,
                    "ignoring incomplete final journal line"
                );
            }
            Err(e) => {
                return Err(anyhow!(
                    "Invalid journal record in {} at line {}: {}",
                    source,
                    idx + 1,
                    e
                ));
            }
        }
    }
    Ok(messages)
}

/// Journal held in memory, for dry runs and tests.
#[derive(Default)]
pub struct MemoryJournal {
    messages: Mutex<Vec<JournalMessage>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: &JournalMessage) {
        self.messages.lock().push(message.clone());
    }

    pub fn read_all(&self) -> Vec<JournalMessage> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn wipe(id: &str) -> JournalMessage {
        JournalMessage::Wipe {
            future_id: id.to_string(),
        }
    }

    #[test]
    fn test_file_journal_roundtrip() -> Result<()> {
        let temp = TempDir::new()?;
        let journal = FileJournal::new(temp.path().join("dep").join("journal.jsonl"));
        assert!(journal.read_all()?.is_empty());

        journal.record(&JournalMessage::RunStart { chain_id: 1 })?;
        journal.record(&wipe("M#A"))?;
        let messages = journal.read_all()?;
        assert_eq!(messages, vec![JournalMessage::RunStart { chain_id: 1 }, wipe("M#A")]);
        Ok(())
    }

    #[test]
    fn test_torn_final_line_is_skipped() -> Result<()> {
        let contents = format!(
            "{}\n{{\"type\":\"wipe\",\"futu",
            serde_json::to_string(&wipe("M#A"))?
        );
        let messages = parse_journal(&contents, "test")?;
        assert_eq!(messages, vec![wipe("M#A")]);
        Ok(())
    }

    #[test]
    fn test_unknown_record_is_hard_error_with_line() {
        let contents = "{\"type\":\"run-start\",\"chainId\":1}\n{\"type\":\"mystery\"}\n";
        let err = parse_journal(contents, "journal.jsonl").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");

        // A complete final record is not torn, even without its newline.
        let unterminated = "{\"type\":\"run-start\",\"chainId\":1}\n{\"type\":\"mystery\",\"futureId\":\"M#A\"}";
        let err = parse_journal(unterminated, "journal.jsonl").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");

        let garbled = "{\"type\":\"run-start\",\"chainId\":1}\n{\"type\":\"wipe\"}}";
        assert!(parse_journal(garbled, "journal.jsonl").is_err());
    }

    #[test]
    fn test_memory_journal() {
        let journal = MemoryJournal::new();
        assert!(journal.is_empty());
        journal.record(&wipe("M#A"));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.read_all(), vec![wipe("M#A")]);
    }
}
