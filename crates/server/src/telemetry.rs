//! Tracing setup and notification logging

use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use ivr_agent_config::ObservabilityConfig;
use ivr_agent_core::AgentEvent;

use crate::ServerError;

/// Initialize the global subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr; stdout
/// carries outbound commands.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ServerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ivr_agent={}", config.log_level).into());

    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ServerError::Internal(format!("tracing already initialized: {}", e)))
}

/// Log agent notifications until the channel closes
pub async fn log_events(mut events: broadcast::Receiver<AgentEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::debug!(?event, "Agent event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Agent event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
