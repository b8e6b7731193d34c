use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One committed operation in a graph's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub version_id: u64,
    pub function_used: String,
    pub time_modified: NaiveDateTime,
    pub duration: Duration,
    pub nodes: usize,
    pub edges: usize,
    pub d_n: i64,
    pub d_e: i64,
}

/// Append-only list of [`LogEntry`] values with strictly increasing versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        function_used: &str,
        started: Instant,
        before: (usize, usize),
        after: (usize, usize),
    ) -> &LogEntry {
        let version_id = self.entries.last().map_or(1, |entry| entry.version_id + 1);
        self.entries.push(LogEntry {
            version_id,
            function_used: function_used.to_string(),
            time_modified: Utc::now().naive_utc(),
            duration: started.elapsed(),
            nodes: after.0,
            edges: after.1,
            d_n: count_delta(before.0, after.0),
            d_e: count_delta(before.1, after.1),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn functions(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.function_used.as_str())
            .collect()
    }
}

fn count_delta(before: usize, after: usize) -> i64 {
    i64::try_from(after).unwrap_or(i64::MAX) - i64::try_from(before).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_increase_and_deltas_are_signed() {
        let mut log = ActionLog::new();
        log.record("create_graph", Instant::now(), (0, 0), (0, 0));
        log.record("add_node", Instant::now(), (0, 0), (1, 0));
        let entry = log
            .record("delete_node", Instant::now(), (1, 0), (0, 0))
            .clone();

        assert_eq!(entry.version_id, 3);
        assert_eq!(entry.d_n, -1);
        assert_eq!(
            log.functions(),
            vec!["create_graph", "add_node", "delete_node"]
        );
    }
}
