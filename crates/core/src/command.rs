//! Outbound command port

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::events::OutboundCommand;

/// Sink for commands leaving the core
///
/// `send` resolves once the collaborator has accepted the command. For speech
/// this is the point at which the playback queue moves on to the next request.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(&self, command: OutboundCommand) -> Result<()>;
}

/// Command sink backed by an unbounded channel
#[derive(Clone)]
pub struct ChannelCommandSink {
    tx: mpsc::UnboundedSender<OutboundCommand>,
}

impl ChannelCommandSink {
    pub fn new(tx: mpsc::UnboundedSender<OutboundCommand>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl CommandSink for ChannelCommandSink {
    async fn send(&self, command: OutboundCommand) -> Result<()> {
        tracing::debug!(call_id = %command.call_id(), kind = command.kind(), "Outbound command");
        self.tx.send(command).map_err(|_| Error::ChannelClosed)
    }
}
