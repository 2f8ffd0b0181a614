//! Periodic status sweep for one correlation table.
//!
//! A loop runs only while its table has records; once drained it stops
//! rescheduling, and intake spawns a fresh one when needed. Cancellation
//! (reconnect, shutdown) goes through a `CancellationToken` rather than an
//! open-ended timer chain.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::correlation::table::TableKind;
use crate::correlation::{CorrelationService, ResolveOutcome};

/// Sweep the given table until it drains or the token fires. The first sweep
/// runs immediately; later ones are an interval apart.
pub(crate) async fn run_poll_loop(
    service: Arc<CorrelationService>,
    kind: TableKind,
    token: CancellationToken,
) {
    let mut ticker = interval(service.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(?kind, "poll loop cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let targets = service.poll_targets(kind).await;
        for (transaction_id, execution_ref) in targets {
            match service.engine().describe_execution(&execution_ref).await {
                Ok(status) => {
                    // The record may have been resolved by push mid-sweep;
                    // resolve re-checks existence under the lock.
                    match service.resolve(&transaction_id, status, kind).await {
                        ResolveOutcome::NotFound => {
                            debug!(%transaction_id, "record resolved elsewhere mid-sweep; skipping")
                        }
                        ResolveOutcome::StillRunning => {}
                        outcome => debug!(%transaction_id, ?outcome, "resolved by poll"),
                    }
                }
                Err(err) => {
                    warn!(
                        %transaction_id,
                        error = %err,
                        "status query failed; retrying next cycle"
                    );
                }
            }
        }

        if service.finish_if_drained(kind, &token).await {
            debug!(?kind, "table drained; poll loop stopping");
            return;
        }
    }
}
