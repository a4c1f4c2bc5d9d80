//! Channel-backed chunk producer.

use bridge_traits::{
    error::{BridgeError, Result},
    ChunkProducer, ChunkRequest,
};
use tokio::sync::mpsc;
use tracing::trace;

/// [`ChunkProducer`] that hands each request to an unbounded channel.
///
/// Sending never blocks, so it is safe to call from the engine loop. Once the
/// receiving side is dropped every request fails with
/// [`BridgeError::Disconnected`].
#[derive(Debug, Clone)]
pub struct ChannelChunkProducer {
    sender: mpsc::UnboundedSender<ChunkRequest>,
}

impl ChannelChunkProducer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChunkRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ChunkProducer for ChannelChunkProducer {
    fn request_chunks(&self, request: ChunkRequest) -> Result<()> {
        trace!(
            generation = %request.generation,
            start_index = request.start_index,
            count = request.count,
            seek = request.is_seek(),
            "Forwarding chunk request"
        );
        self.sender
            .send(request)
            .map_err(|_| BridgeError::Disconnected("chunk request receiver dropped".to_string()))
    }
}
