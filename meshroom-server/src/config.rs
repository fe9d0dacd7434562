//! Server configuration, read from the command line or the environment.

use crate::room::DEFAULT_ROOM_INBOX;
use axum::http::HeaderValue;
use clap::Parser;
use std::net::SocketAddr;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "meshroom-server", about = "Room signaling server for peer-to-peer calls")]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    #[arg(long, env = "MESHROOM_BIND", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind: SocketAddr,

    /// Queue length of each room's command inbox.
    #[arg(long, env = "MESHROOM_ROOM_INBOX", default_value_t = DEFAULT_ROOM_INBOX)]
    pub room_inbox: usize,

    /// Allowed browser origin; `*` allows any. Unset disables CORS headers.
    #[arg(long, env = "MESHROOM_CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Log filter directive.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log: String,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_inbox == 0 {
            return Err(ConfigError::InvalidValue(
                "room inbox must hold at least one command".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cors_layer(&self) -> Result<Option<CorsLayer>, ConfigError> {
        let Some(origin) = &self.cors_origin else {
            return Ok(None);
        };

        let allow_origin = if origin == "*" {
            AllowOrigin::from(Any)
        } else {
            let value = HeaderValue::from_str(origin)
                .map_err(|_| ConfigError::InvalidCorsOrigin(origin.clone()))?;
            AllowOrigin::exact(value)
        };

        Ok(Some(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ))
    }
}
