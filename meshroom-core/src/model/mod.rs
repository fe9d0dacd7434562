mod connection;
mod participant;
mod room;
mod signaling;

pub use connection::ConnectionId;
pub use participant::{Capabilities, Participant, PeerAddress};
pub use room::RoomId;
pub use signaling::{ClientMessage, ServerMessage};
