pub use meshroom_core::{ClientMessage, ConnectionId, RoomId, ServerMessage};

pub mod model {
    pub use meshroom_core::model::*;
    pub use meshroom_core::ModelError;
}

#[cfg(feature = "server")]
pub mod server {
    pub use meshroom_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshroom_client::*;
}
