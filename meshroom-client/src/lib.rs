mod engine;
pub mod error;
pub mod media;
pub mod mesh;
pub mod presence;

pub use engine::*;
pub use error::{MediaError, SessionError};
pub use presence::{ChatMessage, Presence, RemoteParticipant};
