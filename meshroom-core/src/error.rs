use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("invalid connection id '{0}'")]
    InvalidConnectionId(String),
}
