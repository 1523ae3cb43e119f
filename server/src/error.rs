use thiserror::Error;

/// Failures reaching a room through the registry or a handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The room id is not registered. Joins must ensure the room first.
    #[error("room {0} not found")]
    NotFound(String),
    /// The room loop has already stopped.
    #[error("room {0} has stopped")]
    Stopped(String),
}

/// Failures handling one inbound client message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("occupant {0} has not joined a room")]
    NotInRoom(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Room(#[from] RoomError),
}
