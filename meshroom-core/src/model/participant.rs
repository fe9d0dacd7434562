use crate::ConnectionId;
use serde::{Deserialize, Serialize};

/// Wire text older clients send while their address is still being resolved.
const PENDING_MARKER: &str = "pending";

/// Token the media transport needs in order to dial a participant.
///
/// Serialized as an optional string. `null`, `""` and `"pending"` all decode
/// as [`PeerAddress::Pending`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum PeerAddress {
    #[default]
    Pending,
    Ready(String),
}

impl PeerAddress {
    pub fn ready(token: impl Into<String>) -> Self {
        Self::from(Some(token.into()))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&str> {
        match self {
            Self::Ready(token) => Some(token),
            Self::Pending => None,
        }
    }
}

impl From<Option<String>> for PeerAddress {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(token) if !token.is_empty() && token != PENDING_MARKER => Self::Ready(token),
            _ => Self::Pending,
        }
    }
}

impl From<PeerAddress> for Option<String> {
    fn from(value: PeerAddress) -> Self {
        match value {
            PeerAddress::Ready(token) => Some(token),
            PeerAddress::Pending => None,
        }
    }
}

fn enabled() -> bool {
    true
}

/// Published video/audio state of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default = "enabled")]
    pub video_enabled: bool,
    #[serde(default = "enabled")]
    pub audio_enabled: bool,
}

impl Capabilities {
    pub fn new(video_enabled: bool, audio_enabled: bool) -> Self {
        Self {
            video_enabled,
            audio_enabled,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// One joined client as seen by everybody in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub peer_address: PeerAddress,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

impl Participant {
    pub fn new(
        connection_id: ConnectionId,
        display_name: impl Into<String>,
        peer_address: PeerAddress,
    ) -> Self {
        Self {
            connection_id,
            display_name: display_name.into(),
            peer_address,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}
