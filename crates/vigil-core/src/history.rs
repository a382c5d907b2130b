use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The ring keeps only this many entries; the oldest is dropped on overflow.
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Success,
    Error,
    Disconnect,
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(format!("unknown history kind: {other}")),
        }
    }
}

/// One lifecycle event in a bot's connection history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryKind,
    pub message: String,
}

impl HistoryEntry {
    pub fn now(kind: HistoryKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        }
    }
}

/// Bounded append-only log of lifecycle events, FIFO eviction at capacity.
#[derive(Clone, Debug, Default)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// All retained entries in append order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry::now(HistoryKind::Success, format!("event {n}"))
    }

    #[test]
    fn empty_ring_returns_empty() {
        let ring = HistoryRing::new();
        assert!(ring.is_empty());
        assert!(ring.recent(10).is_empty());
    }

    #[test]
    fn push_retains_append_order() {
        let mut ring = HistoryRing::new();
        for n in 0..3 {
            ring.push(entry(n));
        }
        let messages: Vec<_> = ring.iter().map(|e| e.message.clone()).collect();
        assert_eq!(messages, vec!["event 0", "event 1", "event 2"]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut ring = HistoryRing::new();
        for n in 0..100 {
            ring.push(entry(n));
            assert!(ring.len() <= HISTORY_CAPACITY);
        }
        assert_eq!(ring.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn retains_exactly_last_ten_in_order() {
        let mut ring = HistoryRing::new();
        for n in 0..25 {
            ring.push(entry(n));
        }
        let messages: Vec<_> = ring.iter().map(|e| e.message.clone()).collect();
        let expected: Vec<_> = (15..25).map(|n| format!("event {n}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn recent_is_newest_first() {
        let mut ring = HistoryRing::new();
        for n in 0..5 {
            ring.push(entry(n));
        }
        let recent = ring.recent(3);
        let messages: Vec<_> = recent.iter().map(|e| e.message.clone()).collect();
        assert_eq!(messages, vec!["event 4", "event 3", "event 2"]);
    }

    #[test]
    fn recent_limit_larger_than_len() {
        let mut ring = HistoryRing::new();
        ring.push(entry(0));
        assert_eq!(ring.recent(10).len(), 1);
    }

    #[test]
    fn kind_display_and_from_str_roundtrip() {
        for kind in [HistoryKind::Success, HistoryKind::Error, HistoryKind::Disconnect] {
            let parsed: HistoryKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("noise".parse::<HistoryKind>().is_err());
    }
}
