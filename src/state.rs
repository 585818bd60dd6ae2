//! Process-wide snapshot container shared across request handlers

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, RfmError};
use crate::rfm::Snapshot;

/// Shared application state: one slot holding the active snapshot.
///
/// The slot starts empty and is replaced wholesale on each successful
/// upload. Readers clone out an `Arc`, so a snapshot being replaced stays
/// alive for requests already working on it and nobody can observe a
/// half-built one. Concurrent uploads serialize on the write lock with
/// last-writer-wins semantics.
#[derive(Clone, Default)]
pub struct AppState {
    snapshot: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically install a freshly computed snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write() = Some(Arc::new(snapshot));
    }

    /// The active snapshot, or `NoData` when nothing has been uploaded yet.
    pub fn current(&self) -> Result<Arc<Snapshot>> {
        self.snapshot.read().clone().ok_or(RfmError::NoData)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfm::build_snapshot;
    use crate::data::read_table;

    fn sample_snapshot(marker: &str) -> Snapshot {
        let csv = format!(
            "customerid,invoicedate,quantity,price\n{marker},2024-01-10,2,10\n"
        );
        let table = read_table(csv.as_bytes(), "sample.csv").unwrap();
        build_snapshot(&table).unwrap()
    }

    #[test]
    fn empty_state_reports_no_data() {
        let state = AppState::new();
        assert!(!state.is_loaded());
        assert!(matches!(state.current(), Err(RfmError::NoData)));
    }

    #[test]
    fn replace_swaps_the_whole_snapshot() {
        let state = AppState::new();
        state.replace(sample_snapshot("first"));
        assert_eq!(state.current().unwrap().customers[0].customer_id, "first");

        state.replace(sample_snapshot("second"));
        assert_eq!(state.current().unwrap().customers[0].customer_id, "second");
        assert_eq!(state.current().unwrap().customers.len(), 1);
    }

    #[test]
    fn readers_keep_their_snapshot_across_a_replace() {
        let state = AppState::new();
        state.replace(sample_snapshot("old"));
        let held = state.current().unwrap();
        state.replace(sample_snapshot("new"));
        assert_eq!(held.customers[0].customer_id, "old");
    }
}
