use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::mpsc;

use crate::channel::{self, ChannelEvent};
use crate::config::Config;
use crate::correlation::CorrelationService;
use crate::engine::ExecutionEngine;
use crate::listener;
use crate::sim::SimEngine;
use crate::types::Reply;

#[derive(Parser)]
#[command(name = "syncgate")]
#[command(about = "Request/response gateway over asynchronous executions", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an end-to-end demo against the in-process simulator
    Demo {
        /// Number of requests to submit
        #[arg(long, default_value = "3")]
        requests: usize,

        /// Simulated execution duration in milliseconds
        #[arg(long, default_value = "750")]
        execution_ms: u64,

        /// Keep the push channel offline and deliver replies by poll only
        #[arg(long)]
        offline: bool,

        /// Override the poll interval in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Submit requests whose executions end in a terminal failure
        #[arg(long)]
        fail: bool,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    if let Some(config_path) = &cli.config {
        std::env::set_var("SYNCGATE_CONFIG_PATH", config_path);
    }

    // Load and validate configuration before executing any command
    let config = Config::load()?;

    match cli.command {
        Commands::Demo {
            requests,
            execution_ms,
            offline,
            poll_ms,
            fail,
        } => {
            run_demo(config, requests, execution_ms, offline, poll_ms, fail).await?;
        }
    }

    Ok(())
}

async fn run_demo(
    config: Config,
    requests: usize,
    execution_ms: u64,
    offline: bool,
    poll_ms: Option<u64>,
    fail: bool,
) -> Result<()> {
    let poll_interval = poll_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.poll_interval());

    let (events_tx, events_rx) = mpsc::channel(64);

    let mut engine = SimEngine::new(Duration::from_millis(execution_ms));
    if !offline {
        engine = engine.with_push(
            events_tx.clone(),
            config.channel.topic_root.clone(),
            config.channel.worker_namespace.clone(),
        );
    }
    let engine: Arc<dyn ExecutionEngine> = Arc::new(engine);

    let service = CorrelationService::new(engine, poll_interval);
    let listener_task = tokio::spawn(listener::run_listener(Arc::clone(&service), events_rx));

    if offline {
        events_tx.send(ChannelEvent::Disconnected).await.ok();
        println!("Push channel offline; completions arrive by status poll");
    } else {
        events_tx.send(ChannelEvent::Connected).await.ok();
        println!(
            "Subscribed to {}",
            channel::subscription_filter(
                &config.channel.topic_root,
                &config.channel.worker_namespace
            )
        );
    }

    let mut waiting = Vec::with_capacity(requests);
    for i in 0..requests {
        let input = json!({"request": i, "fail": fail});
        let (transaction_id, rx) = service.submit(input).await?;
        println!("→ request {} submitted as transaction {}", i, transaction_id);
        waiting.push((transaction_id, rx));
    }

    for (transaction_id, rx) in waiting {
        match rx.await {
            Ok(Reply::Success) => println!("✓ {} succeeded", transaction_id),
            Ok(Reply::Failure { status }) => println!("✗ {} failed: {}", transaction_id, status),
            Err(_) => println!("✗ {} dropped without a reply", transaction_id),
        }
    }

    drop(events_tx);
    service.shutdown().await;
    listener_task.await.ok();

    Ok(())
}
