//! In-process simulation of both collaborators.
//!
//! Used by the demo CLI and end-to-end tests: executions reach a terminal
//! status after a fixed delay, and with push delivery enabled a completion
//! message is published to the same event queue a real broker client would
//! feed, under the `root/namespace/transaction_id` topic scheme.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

use crate::channel::{self, ChannelEvent};
use crate::engine::ExecutionEngine;
use crate::error::EngineError;
use crate::types::{ExecutionStatus, StartedExecution};

struct SimExecution {
    finish_at: Instant,
    terminal: ExecutionStatus,
}

struct PushSide {
    events: mpsc::Sender<ChannelEvent>,
    topic_root: String,
    namespace: String,
}

/// Simulated execution engine. An input of `{"fail": true}` produces a
/// `FAILED` terminal status; everything else succeeds.
pub struct SimEngine {
    execution_delay: Duration,
    executions: Mutex<HashMap<String, SimExecution>>,
    push: Option<PushSide>,
}

impl SimEngine {
    pub fn new(execution_delay: Duration) -> Self {
        Self {
            execution_delay,
            executions: Mutex::new(HashMap::new()),
            push: None,
        }
    }

    /// Publish a completion message when an execution finishes, as a healthy
    /// push channel would.
    pub fn with_push(
        mut self,
        events: mpsc::Sender<ChannelEvent>,
        topic_root: String,
        namespace: String,
    ) -> Self {
        self.push = Some(PushSide {
            events,
            topic_root,
            namespace,
        });
        self
    }
}

#[async_trait]
impl ExecutionEngine for SimEngine {
    async fn start_execution(&self, input: JsonValue) -> Result<StartedExecution, EngineError> {
        let transaction_id = Uuid::new_v4().to_string();
        let execution_ref = format!("sim:execution:{}", transaction_id);

        let terminal = if input.get("fail").and_then(|v| v.as_bool()) == Some(true) {
            ExecutionStatus::Failed("FAILED".to_string())
        } else {
            ExecutionStatus::Succeeded
        };

        let mut executions = self.executions.lock().await;
        executions.insert(
            execution_ref.clone(),
            SimExecution {
                finish_at: Instant::now() + self.execution_delay,
                terminal: terminal.clone(),
            },
        );

        if let Some(push) = &self.push {
            let events = push.events.clone();
            let topic = channel::topic_for(&push.topic_root, &push.namespace, &transaction_id);
            let delay = self.execution_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let payload = json!({"status": terminal.to_string()});
                events.send(ChannelEvent::Message { topic, payload }).await.ok();
            });
        }

        Ok(StartedExecution {
            transaction_id,
            execution_ref,
        })
    }

    async fn describe_execution(
        &self,
        execution_ref: &str,
    ) -> Result<ExecutionStatus, EngineError> {
        let executions = self.executions.lock().await;
        let execution = executions.get(execution_ref).ok_or_else(|| {
            EngineError::Transport(format!("unknown execution: {}", execution_ref))
        })?;

        if Instant::now() < execution.finish_at {
            Ok(ExecutionStatus::Running)
        } else {
            Ok(execution.terminal.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn execution_runs_then_succeeds() {
        let engine = SimEngine::new(Duration::from_millis(500));
        let started = engine.start_execution(json!({})).await.unwrap();

        let status = engine.describe_execution(&started.execution_ref).await.unwrap();
        assert_eq!(status, ExecutionStatus::Running);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let status = engine.describe_execution(&started.execution_ref).await.unwrap();
        assert_eq!(status, ExecutionStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_input_produces_failed_token() {
        let engine = SimEngine::new(Duration::from_millis(100));
        let started = engine.start_execution(json!({"fail": true})).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = engine.describe_execution(&started.execution_ref).await.unwrap();
        assert_eq!(status, ExecutionStatus::Failed("FAILED".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn push_side_publishes_on_completion() {
        let (tx, mut rx) = mpsc::channel(8);
        let engine = SimEngine::new(Duration::from_millis(100)).with_push(
            tx,
            "syncgate".to_string(),
            "worker-a".to_string(),
        );
        let started = engine.start_execution(json!({})).await.unwrap();

        let event = rx.recv().await.unwrap();
        match event {
            ChannelEvent::Message { topic, payload } => {
                assert_eq!(
                    channel::transaction_from_topic(&topic),
                    Some(started.transaction_id.as_str())
                );
                assert_eq!(payload, json!({"status": "SUCCEEDED"}));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_execution_is_a_transport_error() {
        let engine = SimEngine::new(Duration::from_millis(100));
        let err = engine.describe_execution("sim:execution:nope").await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
    }
}
