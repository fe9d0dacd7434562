use crate::model::{Capabilities, ConnectionId, Participant, PeerAddress, RoomId};
use serde::{Deserialize, Serialize};

fn enabled() -> bool {
    true
}

/// Frames a client sends to the signaling server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom {
        room_id: RoomId,
        display_name: String,
        #[serde(default)]
        peer_address: PeerAddress,
        #[serde(default = "enabled")]
        video_enabled: bool,
        #[serde(default = "enabled")]
        audio_enabled: bool,
    },
    ToggleState {
        room_id: RoomId,
        video_enabled: bool,
        audio_enabled: bool,
    },
    /// The sender's peer address resolved after it joined.
    AnnounceAddress {
        room_id: RoomId,
        peer_address: PeerAddress,
    },
    SendMessage {
        room_id: RoomId,
        text: String,
    },
    LeaveRoom {
        room_id: RoomId,
    },
}

impl ClientMessage {
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::ToggleState { room_id, .. }
            | Self::AnnounceAddress { room_id, .. }
            | Self::SendMessage { room_id, .. }
            | Self::LeaveRoom { room_id } => room_id,
        }
    }

    pub fn toggle(room_id: RoomId, capabilities: Capabilities) -> Self {
        Self::ToggleState {
            room_id,
            video_enabled: capabilities.video_enabled,
            audio_enabled: capabilities.audio_enabled,
        }
    }
}

/// Frames the signaling server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection.
    Welcome { connection_id: ConnectionId },
    /// Members already in the room when the recipient joined, in arrival order.
    RoomSnapshot {
        room_id: RoomId,
        participants: Vec<Participant>,
    },
    ParticipantJoined {
        room_id: RoomId,
        participant: Participant,
    },
    ParticipantToggled {
        room_id: RoomId,
        connection_id: ConnectionId,
        video_enabled: bool,
        audio_enabled: bool,
    },
    PeerAddressReady {
        room_id: RoomId,
        connection_id: ConnectionId,
        peer_address: PeerAddress,
    },
    ChatMessage {
        room_id: RoomId,
        sender_id: ConnectionId,
        sender_name: String,
        text: String,
    },
    ParticipantLeft {
        room_id: RoomId,
        connection_id: ConnectionId,
    },
    /// A frame from the recipient was dropped.
    Error { reason: String },
}

impl ServerMessage {
    /// The room a frame is about; `None` for connection-level frames.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::RoomSnapshot { room_id, .. }
            | Self::ParticipantJoined { room_id, .. }
            | Self::ParticipantToggled { room_id, .. }
            | Self::PeerAddressReady { room_id, .. }
            | Self::ChatMessage { room_id, .. }
            | Self::ParticipantLeft { room_id, .. } => Some(room_id),
            Self::Welcome { .. } | Self::Error { .. } => None,
        }
    }
}
