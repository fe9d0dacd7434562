use async_trait::async_trait;
use meshroom_core::{ConnectionId, ServerMessage};

/// Outbound side of the signaling channel.
///
/// Rooms push every notification through this seam, which keeps them free of
/// socket handling and lets tests capture the traffic.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue `msg` for the client behind `to`. Unknown connections are skipped.
    async fn deliver(&self, to: ConnectionId, msg: ServerMessage);
}
