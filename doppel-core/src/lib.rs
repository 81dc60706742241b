//! DoppelGamble core - data model, storage and collaborator interfaces
//!
//! This library holds everything the game engine builds on: the game and
//! player records, the SQLite store that is their single source of truth,
//! configuration, and the traits through which the birthday oracle and the
//! notification sink are reached.

pub mod config;
pub mod error;
pub mod notify;
pub mod oracle;
pub mod storage;
pub mod types;

pub use config::GameConfig;
pub use error::{DoppelError, Result};
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier, WebhookNotifier};
pub use oracle::{BirthdayOracle, EpochBirthdayOracle, FixedBirthdayOracle};
pub use storage::{GameStore, GameSummary, PlayerStore, Storage};
pub use types::{
    Amount, BetType, Birthday, Fid, Game, GameOutcome, GameStatus, Player, COHORT_SIZE,
};
