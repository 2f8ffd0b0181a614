//! Pending-request records and the response handle.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::types::Reply;

/// The capability to deliver exactly one reply to a waiting caller.
///
/// The caller holds the receiving half and may drop it at any time (an
/// upstream timeout firing first); the resolver must treat that as a benign
/// race, not an error.
#[derive(Debug)]
pub struct ResponseHandle {
    tx: Option<oneshot::Sender<Reply>>,
}

impl ResponseHandle {
    pub fn new() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// True once the handle can no longer deliver a reply: either a reply was
    /// already sent, or the caller stopped waiting.
    pub fn is_completed(&self) -> bool {
        match &self.tx {
            None => true,
            Some(tx) => tx.is_closed(),
        }
    }

    /// Deliver the reply. Returns false if the handle was already spent or
    /// the caller is gone; a handle never delivers twice.
    pub fn complete(&mut self, reply: Reply) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }
}

/// A client request waiting on an asynchronous execution.
#[derive(Debug)]
pub struct PendingRequest {
    pub transaction_id: String,
    pub execution_ref: String,
    pub created_at: DateTime<Utc>,
    pub handle: ResponseHandle,
}

impl PendingRequest {
    pub fn new(
        transaction_id: String,
        execution_ref: String,
    ) -> (Self, oneshot::Receiver<Reply>) {
        let (handle, rx) = ResponseHandle::new();
        let record = Self {
            transaction_id,
            execution_ref,
            created_at: Utc::now(),
            handle,
        };
        (record, rx)
    }
}
