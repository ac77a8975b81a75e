//! Bounded in-memory record of recent tool calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default ring capacity.
const DEFAULT_CAPACITY: usize = 256;

/// One recorded tool call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub tool: String,
    pub revision: String,
    pub duration_ms: u64,
    pub ok: bool,
    pub at: DateTime<Utc>,
}

/// Ring buffer of recent tool calls.
pub struct TraceRecorder {
    entries: Mutex<VecDeque<TraceEntry>>,
    capacity: usize,
}

impl TraceRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Record one call, evicting the oldest entry when full.
    pub fn record(&self, entry: TraceEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Most recent entries, newest last.
    #[must_use]
    pub fn recent(&self) -> Vec<TraceEntry> {
        self.entries.lock().map(|entries| entries.iter().cloned().collect()).unwrap_or_default()
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TraceRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceRecorder").field("capacity", &self.capacity).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tool: &str) -> TraceEntry {
        TraceEntry {
            tool: tool.to_string(),
            revision: "r".to_string(),
            duration_ms: 1,
            ok: true,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_ring_eviction() {
        let recorder = TraceRecorder::with_capacity(2);
        recorder.record(entry("a"));
        recorder.record(entry("b"));
        recorder.record(entry("c"));

        let recent = recorder.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tool, "b");
        assert_eq!(recent[1].tool, "c");
    }
}
