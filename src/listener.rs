//! Push-listener task.
//!
//! Drains the event queue fed by the channel implementation: connectivity
//! signals drive the service's state machine, inbound messages are routed to
//! the resolver by the transaction id in their routing key.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::{self, ChannelEvent};
use crate::correlation::{CorrelationService, ResolveOutcome};

/// Run until the channel implementation drops its sender.
pub async fn run_listener(
    service: Arc<CorrelationService>,
    mut events: mpsc::Receiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Connected => service.on_connected().await,
            ChannelEvent::Disconnected => service.on_disconnected().await,
            ChannelEvent::Message { topic, payload } => {
                let Some(transaction_id) = channel::transaction_from_topic(&topic) else {
                    warn!(%topic, "notification with empty routing key; dropping");
                    continue;
                };
                let Some(status) = channel::status_from_payload(&payload) else {
                    // The poll path owns retries; a mangled push payload is
                    // only dropped, never treated as success.
                    warn!(%topic, "notification without status field; dropping");
                    continue;
                };
                match service.resolve_from_push(transaction_id, status).await {
                    ResolveOutcome::NotFound => {
                        // Late or duplicate delivery, or a request already
                        // resolved by polling. Expected under the handover
                        // protocol.
                        debug!(%transaction_id, "notification for unknown transaction; dropping")
                    }
                    outcome => debug!(%transaction_id, ?outcome, "push notification applied"),
                }
            }
        }
    }
    info!("notification event stream ended; listener exiting");
}
