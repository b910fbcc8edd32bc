//! Bookkeeping for overlapping refreshes.
//!
//! `RefreshGate` turns concurrent refreshes of one path into "run again
//! after the current one".  `ChangeLog` remembers single-file refreshes that
//! land while a full rebuild is running so the rebuild can replay them
//! before it publishes.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The file was (re)parsed and a new snapshot published.
    Updated,
    /// Content hash unchanged; nothing published.
    Unchanged,
    /// The file is gone and its declarations were dropped.
    Removed,
    /// Not a source file of this project, or the project is not initialized.
    Ignored,
    /// Another refresh of the same path was in flight; it will run again.
    Coalesced,
}

impl RefreshOutcome {
    pub fn published(self) -> bool {
        matches!(self, RefreshOutcome::Updated | RefreshOutcome::Removed)
    }
}

#[derive(Debug, Default)]
pub struct RefreshGate {
    /// Path in flight -> rerun requested.
    in_flight: Mutex<HashMap<PathBuf, bool>>,
}

impl RefreshGate {
    /// Claim `path`.  Returns `false` (and flags a rerun) when another
    /// refresh of it already holds the claim.
    pub fn begin(&self, path: &Path) -> bool {
        let mut in_flight = self.in_flight.lock();
        match in_flight.get_mut(path) {
            Some(rerun) => {
                *rerun = true;
                false
            }
            None => {
                in_flight.insert(path.to_path_buf(), false);
                true
            }
        }
    }

    /// Release `path`, or keep it and return `true` when a rerun was
    /// requested meanwhile.
    pub fn finish(&self, path: &Path) -> bool {
        let mut in_flight = self.in_flight.lock();
        match in_flight.get_mut(path) {
            Some(rerun) if *rerun => {
                *rerun = false;
                true
            }
            _ => {
                in_flight.remove(path);
                false
            }
        }
    }
}

#[derive(Debug, Default)]
struct ChangeLogInner {
    active: usize,
    next: u64,
    entries: Vec<(u64, PathBuf)>,
}

#[derive(Debug, Default)]
pub struct ChangeLog {
    inner: Mutex<ChangeLogInner>,
}

impl ChangeLog {
    /// Start recording for a full rebuild; returns its mark.
    pub fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.active += 1;
        inner.next
    }

    /// Note that `path` changed.  Only recorded while a rebuild is running.
    pub fn record(&self, path: &Path) {
        let mut inner = self.inner.lock();
        if inner.active == 0 {
            return;
        }
        let seq = inner.next;
        inner.next += 1;
        inner.entries.push((seq, path.to_path_buf()));
    }

    /// End a rebuild started at `mark`, returning the paths changed since.
    pub fn finish(&self, mark: u64) -> BTreeSet<PathBuf> {
        let mut inner = self.inner.lock();
        inner.active = inner.active.saturating_sub(1);
        let changed = inner
            .entries
            .iter()
            .filter(|(seq, _)| *seq >= mark)
            .map(|(_, path)| path.clone())
            .collect();
        if inner.active == 0 {
            inner.entries.clear();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_coalesces_reruns() {
        let gate = RefreshGate::default();
        let path = Path::new("/p/a.js");
        assert!(gate.begin(path));
        assert!(!gate.begin(path));
        assert!(!gate.begin(path));
        assert!(gate.finish(path));
        assert!(!gate.finish(path));
        assert!(gate.begin(path));
    }

    #[test]
    fn test_changelog_only_records_during_rebuild() {
        let log = ChangeLog::default();
        log.record(Path::new("/p/early.js"));
        let mark = log.begin();
        log.record(Path::new("/p/a.js"));
        log.record(Path::new("/p/a.js"));
        log.record(Path::new("/p/b.js"));
        let changed = log.finish(mark);
        assert_eq!(
            changed,
            BTreeSet::from([PathBuf::from("/p/a.js"), PathBuf::from("/p/b.js")])
        );
        assert!(log.finish(log.begin()).is_empty());
    }
}
