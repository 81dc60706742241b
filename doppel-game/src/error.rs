use doppel_core::{DoppelError, Fid, Game, Player};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Core error: {0}")]
    Core(#[from] DoppelError),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid birthday: {0}")]
    InvalidBirthday(String),

    #[error("Invalid bet type '{0}'. Must be 'yes' or 'no'.")]
    InvalidBetType(String),

    #[error("Player {fid} is already in an active game")]
    AlreadyInGame {
        fid: Fid,
        game: Box<Game>,
        player: Box<Player>,
    },

    #[error("Player has already paid and cannot leave: {0}")]
    AlreadyPaid(Uuid),

    #[error("A bet must be placed before paying: {0}")]
    BetRequired(Uuid),

    #[error("Player not found: {0}")]
    PlayerNotFound(Uuid),

    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was written.
    Validation,
    /// An expected branch the caller should handle (duplicate join, cancel after paying, ...).
    Conflict,
    NotFound,
    /// Storage trouble; safe to retry.
    Persistence,
    Internal,
}

impl GameError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::MissingField(_)
            | GameError::InvalidBirthday(_)
            | GameError::InvalidBetType(_) => ErrorKind::Validation,
            GameError::AlreadyInGame { .. }
            | GameError::AlreadyPaid(_)
            | GameError::BetRequired(_) => ErrorKind::Conflict,
            GameError::PlayerNotFound(_) | GameError::GameNotFound(_) => ErrorKind::NotFound,
            GameError::Core(core) => match core {
                DoppelError::Storage(_) | DoppelError::Io(_) => ErrorKind::Persistence,
                DoppelError::InvalidValue(_) => ErrorKind::Validation,
                _ => ErrorKind::Internal,
            },
            GameError::Internal(_) => ErrorKind::Internal,
        }
    }
}
