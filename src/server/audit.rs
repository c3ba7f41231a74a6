//! # Access Audit Trail
//!
//! One line per processed frame, appended and never rewritten:
//!
//! ```text
//! 2024-05-01 12:00:00: Access GRANTED for Alice, Unknown from 10.0.0.7:51234
//! 2024-05-01 12:00:01: Access DENIED for Unknown from 10.0.0.7:51234
//! ```
//!
//! Sinks are shared by every connection task. Each sink serialises its own
//! appends; there is nothing to read back, so nothing else is locked.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;

use parking_lot::Mutex;

use crate::recognition::UNKNOWN_LABEL;

/// One access decision, borrowed from the frame that produced it.
#[derive(Debug, Clone, Copy)]
pub struct AccessEntry<'a> {
    pub timestamp: &'a str,
    pub access_granted: bool,
    pub names: &'a [String],
    pub peer: SocketAddr,
}

impl fmt::Display for AccessEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decision = if self.access_granted { "GRANTED" } else { "DENIED" };
        let names = if self.names.is_empty() {
            UNKNOWN_LABEL.to_string()
        } else {
            self.names.join(", ")
        };
        write!(
            f,
            "{}: Access {} for {} from {}",
            self.timestamp, decision, names, self.peer
        )
    }
}

/// Append-only destination for access decisions.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AccessEntry<'_>) -> io::Result<()>;
}

/// Appends to a text file, creating it if needed.
pub struct FileAuditLog {
    file: Mutex<File>,
}

impl FileAuditLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditLog {
    fn append(&self, entry: &AccessEntry<'_>) -> io::Result<()> {
        let line = format!("{}\n", entry);
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Keeps lines in memory. Useful when embedding the server or in tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: &AccessEntry<'_>) -> io::Result<()> {
        self.lines.lock().push(entry.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.7:51234".parse().unwrap()
    }

    #[test]
    fn test_granted_line() {
        let names = vec!["Alice".to_string(), "Unknown".to_string()];
        let entry = AccessEntry {
            timestamp: "2024-05-01 12:00:00",
            access_granted: true,
            names: &names,
            peer: peer(),
        };
        assert_eq!(
            entry.to_string(),
            "2024-05-01 12:00:00: Access GRANTED for Alice, Unknown from 10.0.0.7:51234"
        );
    }

    #[test]
    fn test_zero_faces_still_names_unknown() {
        let entry = AccessEntry {
            timestamp: "2024-05-01 12:00:01",
            access_granted: false,
            names: &[],
            peer: peer(),
        };
        assert_eq!(
            entry.to_string(),
            "2024-05-01 12:00:01: Access DENIED for Unknown from 10.0.0.7:51234"
        );
    }

    #[test]
    fn test_file_log_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_log.txt");
        let entry = AccessEntry {
            timestamp: "t",
            access_granted: false,
            names: &[],
            peer: peer(),
        };

        FileAuditLog::open(&path).unwrap().append(&entry).unwrap();
        FileAuditLog::open(&path).unwrap().append(&entry).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
