use meshroom_core::{Capabilities, ConnectionId, Participant, PeerAddress};
use tokio::sync::oneshot;

/// The room task stopped accepting commands because it became empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomClosed;

pub type JoinReply = Result<Vec<Participant>, RoomClosed>;

/// Commands the registry forwards to a room task.
#[derive(Debug)]
pub enum RoomCommand {
    /// Register a participant. Replies with the other members in arrival order.
    Join {
        participant: Participant,
        reply: oneshot::Sender<JoinReply>,
    },

    /// Remove a participant. Replies whether it was present.
    Leave {
        connection_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },

    SetCapabilities {
        connection_id: ConnectionId,
        capabilities: Capabilities,
    },

    SetPeerAddress {
        connection_id: ConnectionId,
        peer_address: PeerAddress,
    },

    /// Relay chat text to every member, sender included.
    Chat {
        connection_id: ConnectionId,
        text: String,
    },

    Members {
        reply: oneshot::Sender<Vec<Participant>>,
    },
}
