//! Newline-delimited JSON bridge
//!
//! One `InboundEvent` per input line, one `OutboundCommand` per output line.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use ivr_agent_core::{InboundEvent, OutboundCommand};

use crate::dispatcher::CallDispatcher;
use crate::ServerError;

/// Parse one input line; blank lines yield `None`
pub fn parse_event(line: &str) -> Result<Option<InboundEvent>, ServerError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Feed events from `reader` to the dispatcher until end of input
///
/// Malformed lines are logged and skipped.
pub async fn pump_events<R>(reader: R, dispatcher: Arc<CallDispatcher>) -> Result<usize, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut dispatched = 0;

    while let Some(line) = lines.next_line().await? {
        match parse_event(&line) {
            Ok(Some(event)) => {
                let call_id = event.call_id().to_string();
                match dispatcher.dispatch(event) {
                    Ok(()) => dispatched += 1,
                    Err(e) => tracing::warn!(call_id = %call_id, "Event rejected: {}", e),
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping malformed event: {}", e),
        }
    }

    Ok(dispatched)
}

/// Write each outbound command as a JSON line until the channel closes
pub async fn write_commands<W>(
    mut commands: mpsc::UnboundedReceiver<OutboundCommand>,
    mut writer: W,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
