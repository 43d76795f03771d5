use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub entry_id: String,
    pub seq: u64,
    pub night: u32,
    pub kind: LogKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Public,  // announcements everyone sees
    Private, // role info, inspection results
    System,  // phase changes
}

/// Append-only log. Entries are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameLog {
    entries: Vec<LogEntry>,
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, night: u32, kind: LogKind, content: String, timestamp: DateTime<Utc>) {
        let seq = self.entries.len() as u64 + 1;
        self.entries.push(LogEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            seq,
            night,
            kind,
            content,
            timestamp,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.content.contains(needle))
    }
}
