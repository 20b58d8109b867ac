//! Structural application of oracle decisions to a bucket snapshot.
//!
//! Everything here is pure: the functions take a snapshot and the oracle's
//! answer and compute the bucket's next content. Locking and oracle calls
//! live in the store.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Which reconciliation steps `organize` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizeMode {
    Forget,
    Merge,
    /// Forget, then merge whatever remains.
    All,
}

impl OrganizeMode {
    pub fn forgets(self) -> bool {
        matches!(self, Self::Forget | Self::All)
    }

    pub fn merges(self) -> bool {
        matches!(self, Self::Merge | Self::All)
    }
}

impl std::fmt::Display for OrganizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forget => write!(f, "forget"),
            Self::Merge => write!(f, "merge"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for OrganizeMode {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forget" => Ok(Self::Forget),
            "merge" => Ok(Self::Merge),
            "all" | "organize_all" => Ok(Self::All),
            other => Err(MemoryError::InvalidArgument(format!(
                "unknown organize mode: {other} (expected forget, merge or all)"
            ))),
        }
    }
}

/// Result of applying forget candidates to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgetOutcome {
    pub kept: Vec<String>,
    /// Removed thoughts, in their original bucket order.
    pub forgotten: Vec<String>,
}

/// Set difference of the snapshot minus the oracle's candidates.
///
/// Candidates that are not in the snapshot are ignored; order of the kept
/// thoughts is preserved.
pub fn apply_forget(snapshot: &[String], candidates: &HashSet<String>) -> ForgetOutcome {
    let (forgotten, kept): (Vec<String>, Vec<String>) = snapshot
        .iter()
        .cloned()
        .partition(|t| candidates.contains(t));
    ForgetOutcome { kept, forgotten }
}

/// The oracle's merge output becomes the new content, with exact duplicates
/// collapsed to their first occurrence.
pub fn apply_merge(merged: Vec<String>) -> Vec<String> {
    dedup_preserving_order(merged)
}

/// Install a reconciled list into a bucket that may have grown since its
/// snapshot was taken: `reconciled` followed by the thoughts appended after
/// the snapshot, skipping any whose text is already present.
///
/// `current` must start with the `snapshot_len` thoughts the snapshot held.
pub fn splice_tail(reconciled: Vec<String>, current: &[String], snapshot_len: usize) -> (Vec<String>, usize) {
    let tail = current.get(snapshot_len..).unwrap_or_default();
    let mut seen: HashSet<String> = reconciled.iter().cloned().collect();
    let mut next = reconciled;
    let mut appended = 0;
    for thought in tail {
        if seen.insert(thought.clone()) {
            next.push(thought.clone());
            appended += 1;
        }
    }
    (next, appended)
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mode_parse_and_display() {
        for mode in [OrganizeMode::Forget, OrganizeMode::Merge, OrganizeMode::All] {
            assert_eq!(mode.to_string().parse::<OrganizeMode>().unwrap(), mode);
        }
        assert_eq!("ALL".parse::<OrganizeMode>().unwrap(), OrganizeMode::All);
        assert!("compact".parse::<OrganizeMode>().is_err());
    }

    #[test]
    fn test_mode_steps() {
        assert!(OrganizeMode::Forget.forgets() && !OrganizeMode::Forget.merges());
        assert!(!OrganizeMode::Merge.forgets() && OrganizeMode::Merge.merges());
        assert!(OrganizeMode::All.forgets() && OrganizeMode::All.merges());
    }

    #[test]
    fn test_forget_removes_candidates_in_order() {
        let snapshot = texts(&["a", "b", "c", "d"]);
        let out = apply_forget(&snapshot, &set(&["d", "b"]));
        assert_eq!(out.kept, texts(&["a", "c"]));
        assert_eq!(out.forgotten, texts(&["b", "d"]));
    }

    #[test]
    fn test_forget_ignores_unknown_candidates() {
        let snapshot = texts(&["a", "b"]);
        let out = apply_forget(&snapshot, &set(&["zzz"]));
        assert_eq!(out.kept, snapshot);
        assert!(out.forgotten.is_empty());
    }

    #[test]
    fn test_merge_dedups_first_occurrence() {
        let merged = apply_merge(texts(&["x", "y", "x", "z", "y"]));
        assert_eq!(merged, texts(&["x", "y", "z"]));
    }

    #[test]
    fn test_splice_tail_without_growth() {
        let (next, appended) = splice_tail(texts(&["m"]), &texts(&["a", "b"]), 2);
        assert_eq!(next, texts(&["m"]));
        assert_eq!(appended, 0);
    }

    #[test]
    fn test_splice_tail_appends_new_thoughts_after_reconciled() {
        let current = texts(&["a", "b", "late-1", "late-2"]);
        let (next, appended) = splice_tail(texts(&["ab"]), &current, 2);
        assert_eq!(next, texts(&["ab", "late-1", "late-2"]));
        assert_eq!(appended, 2);
    }

    #[test]
    fn test_splice_tail_skips_texts_already_reconciled() {
        let current = texts(&["a", "b", "ab"]);
        let (next, appended) = splice_tail(texts(&["ab"]), &current, 2);
        assert_eq!(next, texts(&["ab"]));
        assert_eq!(appended, 0);
    }
}
