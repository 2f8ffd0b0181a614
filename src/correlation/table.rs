//! In-memory correlation tables.

use std::collections::HashMap;

use super::pending::PendingRequest;

/// Which of the two tables a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Live table; new requests always land here.
    Primary,
    /// Records mid-handover after a reconnect, polled until drained.
    Transition,
}

/// Map from transaction id to pending-request record.
///
/// All operations are O(1) expected and non-blocking; concurrency control is
/// the owning service's job.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<String, PendingRequest>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. A duplicate transaction id is a logic error upstream;
    /// the displaced record is returned so the caller can log it.
    pub fn put(&mut self, record: PendingRequest) -> Option<PendingRequest> {
        self.entries.insert(record.transaction_id.clone(), record)
    }

    pub fn get_mut(&mut self, transaction_id: &str) -> Option<&mut PendingRequest> {
        self.entries.get_mut(transaction_id)
    }

    pub fn remove(&mut self, transaction_id: &str) -> Option<PendingRequest> {
        self.entries.remove(transaction_id)
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.entries.contains_key(transaction_id)
    }

    /// Take every entry out, leaving the table empty. Only used during the
    /// disconnected-to-transitioning handover, under the service lock.
    pub fn snapshot_and_clear(&mut self) -> Vec<PendingRequest> {
        self.entries.drain().map(|(_, record)| record).collect()
    }

    /// The (transaction_id, execution_ref) pairs a poll sweep should query.
    pub fn poll_targets(&self) -> Vec<(String, String)> {
        self.entries
            .values()
            .map(|r| (r.transaction_id.clone(), r.execution_ref.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PendingRequest {
        PendingRequest::new(id.to_string(), format!("exec-{}", id)).0
    }

    #[test]
    fn put_get_remove() {
        let mut table = CorrelationTable::new();
        assert!(table.put(record("t1")).is_none());
        assert!(table.contains("t1"));
        assert_eq!(table.len(), 1);

        let removed = table.remove("t1").unwrap();
        assert_eq!(removed.execution_ref, "exec-t1");
        assert!(table.is_empty());
        assert!(table.remove("t1").is_none());
    }

    #[test]
    fn duplicate_put_returns_displaced_record() {
        let mut table = CorrelationTable::new();
        table.put(record("t1"));
        let displaced = table.put(record("t1")).unwrap();
        assert_eq!(displaced.transaction_id, "t1");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn snapshot_and_clear_empties_the_table() {
        let mut table = CorrelationTable::new();
        table.put(record("t1"));
        table.put(record("t2"));

        let snapshot = table.snapshot_and_clear();
        assert_eq!(snapshot.len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn poll_targets_pair_ids_with_refs() {
        let mut table = CorrelationTable::new();
        table.put(record("t1"));

        let targets = table.poll_targets();
        assert_eq!(targets, vec![("t1".to_string(), "exec-t1".to_string())]);
    }
}
