//! IVR Agent Server Entry Point
//!
//! Reads inbound events as JSON lines on stdin and writes outbound commands
//! as JSON lines on stdout.

use std::sync::Arc;
use tokio::io::BufReader;

use ivr_agent_agent::CallAgent;
use ivr_agent_config::load_settings;
use ivr_agent_core::ChannelCommandSink;
use ivr_agent_llm::LlmReasoner;
use ivr_agent_server::{init_tracing, log_events, pump_events, write_commands, CallDispatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("IVR_AGENT_ENV").ok();
    let settings = load_settings(env.as_deref())?;

    if let Err(e) = init_tracing(&settings.observability) {
        eprintln!("{}", e);
    }

    tracing::info!("Starting IVR agent v{}", env!("CARGO_PKG_VERSION"));

    let reasoner = LlmReasoner::from_config(&settings.reasoning);
    let (sink, commands) = ChannelCommandSink::channel();
    let (agent, signals) = CallAgent::new(&settings, reasoner, Arc::new(sink));

    tokio::spawn(log_events(agent.subscribe()));
    let writer = tokio::spawn(write_commands(commands, tokio::io::stdout()));

    let dispatcher = CallDispatcher::start(agent, signals);
    tracing::info!(
        max_calls = settings.sessions.max_concurrent_calls,
        "Ready for call events on stdin"
    );

    tokio::select! {
        result = pump_events(BufReader::new(tokio::io::stdin()), Arc::clone(&dispatcher)) => {
            match result {
                Ok(count) => tracing::info!(events = count, "Input closed"),
                Err(e) => tracing::error!("Input failed: {}", e),
            }
        }
        _ = shutdown_signal() => {}
    }

    dispatcher.shutdown();
    writer.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
