//! Completion correlation: the service that remembers which pending client
//! request waits for which asynchronous execution, and settles each caller
//! exactly once from whichever delivery path (push or poll) reports a
//! terminal status first.
//!
//! Both tables, the connectivity state, and the poll-loop handles live behind
//! a single mutex so the reconnect handover (snapshot-and-clear into the
//! transition table) and every resolve are atomic with respect to each other.
//! No await happens while the lock is held.

pub mod pending;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::ExecutionEngine;
use crate::poller;
use crate::types::{ExecutionStatus, Reply};
use pending::PendingRequest;
use table::{CorrelationTable, TableKind};

/// Health of the push channel, as last reported by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Push channel healthy; polling disabled.
    Connected,
    /// Push channel down; the primary table is swept by poll.
    Disconnected,
    /// Push channel just came back while requests were pending. Those
    /// requests are polled out of the transition table, since the broker
    /// does not replay messages missed while disconnected; new requests go
    /// to the primary table under push coverage.
    Transitioning,
}

/// What a single resolver invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Non-terminal status; the record stays pending.
    StillRunning,
    /// The caller received this reply.
    Delivered(Reply),
    /// The handle was already completed (caller-side timeout won the race);
    /// record removed without a second completion.
    Discarded,
    /// No record under that transaction id. Expected for late or duplicate
    /// notifications, or for a poll sweep racing a push resolution.
    NotFound,
}

struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    state: ConnectivityState,
    primary: CorrelationTable,
    transition: CorrelationTable,
    primary_poll: Option<PollHandle>,
    transition_poll: Option<PollHandle>,
}

impl Inner {
    fn table_mut(&mut self, kind: TableKind) -> &mut CorrelationTable {
        match kind {
            TableKind::Primary => &mut self.primary,
            TableKind::Transition => &mut self.transition,
        }
    }

    fn table(&self, kind: TableKind) -> &CorrelationTable {
        match kind {
            TableKind::Primary => &self.primary,
            TableKind::Transition => &self.transition,
        }
    }

    fn poll_slot(&mut self, kind: TableKind) -> &mut Option<PollHandle> {
        match kind {
            TableKind::Primary => &mut self.primary_poll,
            TableKind::Transition => &mut self.transition_poll,
        }
    }

    fn stop_polling(&mut self, kind: TableKind) {
        if let Some(handle) = self.poll_slot(kind).take() {
            handle.token.cancel();
        }
    }
}

/// Owns the correlation tables and the delivery state machine.
pub struct CorrelationService {
    engine: Arc<dyn ExecutionEngine>,
    poll_interval: Duration,
    inner: Mutex<Inner>,
}

impl CorrelationService {
    /// The channel starts out unproven, so the service begins disconnected
    /// and relies on polling until the listener reports a connect.
    pub fn new(engine: Arc<dyn ExecutionEngine>, poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            poll_interval,
            inner: Mutex::new(Inner {
                state: ConnectivityState::Disconnected,
                primary: CorrelationTable::new(),
                transition: CorrelationTable::new(),
                primary_poll: None,
                transition_poll: None,
            }),
        })
    }

    pub fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /* ===================== Request intake ===================== */

    /// Start a new execution on behalf of a caller and register the pending
    /// request in the primary table. Returns the transaction id and the
    /// receiver the caller awaits its reply on. This is the only writer that
    /// creates records.
    pub async fn submit(
        self: &Arc<Self>,
        input: JsonValue,
    ) -> Result<(String, oneshot::Receiver<Reply>)> {
        let started = self
            .engine
            .start_execution(input)
            .await
            .context("failed to start execution")?;

        let transaction_id = started.transaction_id.clone();
        let (record, rx) = PendingRequest::new(started.transaction_id, started.execution_ref);

        let mut inner = self.inner.lock().await;
        if let Some(displaced) = inner.primary.put(record) {
            // The displaced handle is dropped here, which its caller observes
            // as a closed channel rather than a silent hang.
            warn!(
                transaction_id = %displaced.transaction_id,
                "duplicate transaction id from engine; displacing older pending record"
            );
        }
        debug!(%transaction_id, "pending request registered");

        if inner.state == ConnectivityState::Disconnected {
            self.ensure_polling(&mut inner, TableKind::Primary);
        }

        Ok((transaction_id, rx))
    }

    /* ===================== Resolver ===================== */

    /// Apply a status observation to the record in the given table.
    pub async fn resolve(
        &self,
        transaction_id: &str,
        status: ExecutionStatus,
        kind: TableKind,
    ) -> ResolveOutcome {
        let mut inner = self.inner.lock().await;
        Self::resolve_locked(&mut inner, transaction_id, status, kind)
    }

    /// Apply a status observation from the push path. The record is looked up
    /// in the primary table first, then the transition table, which covers
    /// the handover window; both lookups happen under one lock acquisition.
    pub async fn resolve_from_push(
        &self,
        transaction_id: &str,
        status: ExecutionStatus,
    ) -> ResolveOutcome {
        let mut inner = self.inner.lock().await;
        if inner.primary.contains(transaction_id) {
            Self::resolve_locked(&mut inner, transaction_id, status, TableKind::Primary)
        } else if inner.transition.contains(transaction_id) {
            Self::resolve_locked(&mut inner, transaction_id, status, TableKind::Transition)
        } else {
            ResolveOutcome::NotFound
        }
    }

    fn resolve_locked(
        inner: &mut Inner,
        transaction_id: &str,
        status: ExecutionStatus,
        kind: TableKind,
    ) -> ResolveOutcome {
        let table = inner.table_mut(kind);
        let Some(record) = table.get_mut(transaction_id) else {
            return ResolveOutcome::NotFound;
        };

        let reply = match status {
            ExecutionStatus::Running => return ResolveOutcome::StillRunning,
            ExecutionStatus::Succeeded => Reply::Success,
            ExecutionStatus::Failed(token) => Reply::Failure { status: token },
        };

        if record.handle.is_completed() {
            // Caller-side timeout already settled this request; clean up the
            // record and never attempt a second completion.
            table.remove(transaction_id);
            debug!(%transaction_id, "caller already completed; discarding pending record");
            return ResolveOutcome::Discarded;
        }

        let delivered = record.handle.complete(reply.clone());
        table.remove(transaction_id);
        if delivered {
            debug!(%transaction_id, ?reply, "reply delivered");
            ResolveOutcome::Delivered(reply)
        } else {
            ResolveOutcome::Discarded
        }
    }

    /* ===================== Connectivity state machine ===================== */

    /// Push channel went offline: fall back to polling the primary table.
    pub async fn on_disconnected(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectivityState::Disconnected {
            return;
        }
        info!("push channel offline; falling back to status polling");
        inner.state = ConnectivityState::Disconnected;
        if !inner.primary.is_empty() {
            self.ensure_polling(&mut inner, TableKind::Primary);
        }
    }

    /// Push channel (re)connected. Requests pending at this instant were
    /// subscribed-to during the outage and their completion messages will
    /// never be replayed, so they move atomically to the transition table
    /// and keep being polled; everything new gets push coverage.
    pub async fn on_connected(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectivityState::Connected {
            return;
        }

        inner.stop_polling(TableKind::Primary);

        if inner.primary.is_empty() && inner.transition.is_empty() {
            inner.state = ConnectivityState::Connected;
            info!("push channel connected");
            return;
        }

        let moved = inner.primary.snapshot_and_clear();
        let in_flight = moved.len();
        for record in moved {
            if let Some(displaced) = inner.transition.put(record) {
                warn!(
                    transaction_id = %displaced.transaction_id,
                    "transaction already mid-handover; displacing older record"
                );
            }
        }
        inner.state = ConnectivityState::Transitioning;
        info!(
            in_flight,
            draining = inner.transition.len(),
            "push channel reconnected; draining in-flight requests by poll"
        );
        self.ensure_polling(&mut inner, TableKind::Transition);
    }

    /* ===================== Poll-loop supervision ===================== */

    fn ensure_polling(self: &Arc<Self>, inner: &mut Inner, kind: TableKind) {
        let slot = inner.poll_slot(kind);
        if let Some(handle) = slot {
            if !handle.task.is_finished() {
                return;
            }
        }
        let token = CancellationToken::new();
        let task = tokio::spawn(poller::run_poll_loop(
            Arc::clone(self),
            kind,
            token.clone(),
        ));
        *slot = Some(PollHandle { token, task });
    }

    /// Called by a poll loop at the end of each sweep. Returns true when the
    /// table is empty, in which case the loop's slot is cleared (so a later
    /// intake can spawn a fresh loop without racing this one's exit) and a
    /// drained transition table flips the state machine back to connected.
    pub(crate) async fn finish_if_drained(&self, kind: TableKind, token: &CancellationToken) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.table(kind).is_empty() {
            return false;
        }
        // A cancelled loop has already been replaced or stopped; only the
        // live loop may clear the slot.
        if !token.is_cancelled() {
            *inner.poll_slot(kind) = None;
        }
        if kind == TableKind::Transition && inner.state == ConnectivityState::Transitioning {
            inner.state = ConnectivityState::Connected;
            info!("in-flight handover drained; push delivery fully live");
        }
        true
    }

    /// Snapshot of what a sweep over the given table should query.
    pub(crate) async fn poll_targets(&self, kind: TableKind) -> Vec<(String, String)> {
        let inner = self.inner.lock().await;
        inner.table(kind).poll_targets()
    }

    /* ===================== Introspection ===================== */

    pub async fn state(&self) -> ConnectivityState {
        self.inner.lock().await.state
    }

    /// (primary, transition) record counts.
    pub async fn pending_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock().await;
        (inner.primary.len(), inner.transition.len())
    }

    /// Stop any running poll loops. Pending records stay in the tables.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.stop_polling(TableKind::Primary);
        inner.stop_polling(TableKind::Transition);
    }

    #[cfg(test)]
    pub(crate) async fn holds(&self, transaction_id: &str) -> (bool, bool) {
        let inner = self.inner.lock().await;
        (
            inner.primary.contains(transaction_id),
            inner.transition.contains(transaction_id),
        )
    }
}
