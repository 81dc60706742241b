//! DoppelGamble game engine
//!
//! Twenty-three players join a game, each bets on whether two of them share
//! a birthday, pays the entry price and waits. Once every seat is paid a
//! resolver sweep settles the game and splits the pot among the winners.
//!
//! All coordination goes through the SQLite store in `doppel-core`, so any
//! number of engines may run against the same database.

pub mod capacity;
pub mod error;
pub mod lifecycle;
pub mod matchmaker;
pub mod resolution;
pub mod resolver;
pub mod status;

pub use error::{ErrorKind, GameError, Result};
pub use lifecycle::PlayerLifecycle;
pub use matchmaker::Matchmaker;
pub use resolution::{compute_outcome, has_shared_birthday, Outcome, ResolutionEngine, ResolutionSummary};
pub use resolver::BatchResolver;
pub use status::{player_step, PlayerStep, PlayerView, StatusQuery, StatusReport};

use doppel_core::{
    Birthday, BirthdayOracle, Fid, Game, GameConfig, GameStatus, GameSummary, Notifier, Player,
    Storage,
};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const DB_FILE: &str = "doppel.db";

/// Every boundary operation behind one handle.
pub struct DoppelGame {
    config: GameConfig,
    storage: Arc<Storage>,
    oracle: Arc<dyn BirthdayOracle>,
    matchmaker: Matchmaker,
    lifecycle: PlayerLifecycle,
    status: StatusQuery,
    resolver: BatchResolver,
}

impl DoppelGame {
    /// Opens (or creates) the game database inside `data_dir`.
    pub async fn open(
        data_dir: &Path,
        config: GameConfig,
        oracle: Arc<dyn BirthdayOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::new(&data_dir.join(DB_FILE)).await?);
        Ok(Self::with_storage(storage, config, oracle, notifier))
    }

    pub fn with_storage(
        storage: Arc<Storage>,
        config: GameConfig,
        oracle: Arc<dyn BirthdayOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = Arc::new(ResolutionEngine::new(
            storage.clone(),
            config.entry_price,
            notifier,
        ));

        Self {
            matchmaker: Matchmaker::new(storage.clone()),
            lifecycle: PlayerLifecycle::new(storage.clone()),
            status: StatusQuery::new(storage.clone()),
            resolver: BatchResolver::new(storage.clone(), engine),
            config,
            storage,
            oracle,
        }
    }

    pub async fn join(&self, fid: Fid, wallet: &str, birthday: &str) -> Result<(Game, Player)> {
        let birthday: Birthday = birthday
            .parse()
            .map_err(|_| GameError::InvalidBirthday(birthday.to_string()))?;
        self.matchmaker.join(fid, wallet, birthday).await
    }

    pub async fn join_with_oracle(&self, fid: Fid, wallet: &str) -> Result<(Game, Player)> {
        self.matchmaker
            .join_with_oracle(fid, wallet, self.oracle.as_ref())
            .await
    }

    pub async fn place_bet(&self, player_id: Uuid, bet: &str) -> Result<Player> {
        self.lifecycle.place_bet(player_id, bet).await
    }

    pub async fn record_payment(&self, player_id: Uuid, payment_proof: &str) -> Result<Player> {
        self.lifecycle.record_payment(player_id, payment_proof).await
    }

    pub async fn cancel(&self, player_id: Uuid) -> Result<()> {
        self.lifecycle.cancel(player_id).await
    }

    pub async fn get_status(&self, game_id: Option<Uuid>, fid: Option<Fid>) -> Result<StatusReport> {
        self.status.get_status(game_id, fid).await
    }

    pub async fn list_games(&self, status: Option<GameStatus>) -> Result<Vec<GameSummary>> {
        self.status.list_games(status).await
    }

    pub async fn resolve_due_games(&self) -> Result<Vec<ResolutionSummary>> {
        self.resolver.resolve_due_games().await
    }

    /// Birthday the oracle reports for `fid`.
    pub async fn birthday(&self, fid: Fid) -> Result<Birthday> {
        if fid == 0 {
            return Err(GameError::MissingField("fid"));
        }
        Ok(self.oracle.birthday(fid).await?)
    }

    pub fn resolver(&self) -> BatchResolver {
        self.resolver.clone()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }
}
