//! Per-stage scan progress.
//!
//! The backend reports each stage as either `"done"` or a percentage string
//! such as `"45%"`. Reports may be merged in any order: a stage only ever
//! moves forward, so re-applying or reordering ticks yields the same map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stage entry from a status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub stage: String,
    pub status: String,
}

impl ProgressEntry {
    pub fn new(stage: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: status.into(),
        }
    }
}

/// Parse a reported stage status into a percentage.
///
/// `"done"` is 100, `"NN%"` is NN clamped to 100, anything else is 0.
pub fn parse_stage_status(raw: &str) -> u8 {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("done") {
        return 100;
    }

    let digits = raw.trim_end_matches('%').trim();
    match digits.parse::<u64>() {
        Ok(value) => value.min(100) as u8,
        // Fractional percentages are truncated.
        Err(_) => digits
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v.min(100.0) as u8)
            .unwrap_or(0),
    }
}

/// Monotonic stage → percent map for a single scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMap {
    stages: BTreeMap<String, u8>,
}

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stages at 0 so they render before the first report arrives.
    pub fn with_stages<'a>(stages: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = Self::new();
        for stage in stages {
            map.stages.entry(stage.to_string()).or_insert(0);
        }
        map
    }

    /// Merge one entry, keeping the maximum seen for the stage.
    /// Returns true if the stored value changed.
    pub fn merge_entry(&mut self, entry: &ProgressEntry) -> bool {
        let reported = parse_stage_status(&entry.status);
        let slot = self.stages.entry(entry.stage.clone()).or_insert(0);
        if reported > *slot {
            *slot = reported;
            true
        } else {
            false
        }
    }

    /// Merge a whole tick's worth of entries.
    pub fn merge<'a>(&mut self, entries: impl IntoIterator<Item = &'a ProgressEntry>) -> bool {
        let mut changed = false;
        for entry in entries {
            changed |= self.merge_entry(entry);
        }
        changed
    }

    pub fn get(&self, stage: &str) -> Option<u8> {
        self.stages.get(stage).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.stages.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn clear(&mut self) {
        self.stages.clear();
    }

    /// Mean of all stage percentages, 0 when nothing has been reported.
    pub fn overall(&self) -> u8 {
        if self.stages.is_empty() {
            return 0;
        }
        let total: u32 = self.stages.values().map(|v| *v as u32).sum();
        (total / self.stages.len() as u32) as u8
    }

    pub fn all_done(&self) -> bool {
        !self.stages.is_empty() && self.stages.values().all(|v| *v == 100)
    }
}
