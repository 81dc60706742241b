use crate::capacity::check_capacity;
use crate::{GameError, Result};
use doppel_core::storage::{game_store, player_store};
use doppel_core::{Birthday, BirthdayOracle, Fid, Game, Player, Storage};
use rusqlite::Connection;
use std::sync::Arc;

/// Seats incoming players in the oldest open game with room, opening a new
/// game when none has any.
pub struct Matchmaker {
    storage: Arc<Storage>,
}

impl Matchmaker {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn join(&self, fid: Fid, wallet: &str, birthday: Birthday) -> Result<(Game, Player)> {
        if fid == 0 {
            return Err(GameError::MissingField("fid"));
        }
        let wallet = wallet.trim();
        if wallet.is_empty() {
            return Err(GameError::MissingField("wallet"));
        }
        let wallet = wallet.to_string();

        let result = self
            .storage
            .with_transaction(|tx| -> Result<(Game, Player)> {
                if let Some(conflict) = already_in_game(tx, fid)? {
                    return Err(conflict);
                }

                let game = match game_store::find_open_game(tx)? {
                    Some(game) => game,
                    None => {
                        let game = Game::new();
                        game_store::insert_game(tx, &game)?;
                        tracing::info!("Created game {}", game.id);
                        game
                    }
                };

                let player = Player::new(game.id, fid, wallet, birthday);
                player_store::insert_player(tx, &player)?;

                let game = if check_capacity(tx, game.id)? {
                    game_store::load_game(tx, game.id)?
                        .ok_or_else(|| GameError::internal("game vanished during join"))?
                } else {
                    game
                };

                Ok((game, player))
            })
            .await;

        match result {
            Ok((game, player)) => {
                tracing::info!(
                    "Player {} (fid {}) joined game {}",
                    player.id,
                    player.fid,
                    game.id
                );
                Ok((game, player))
            }
            // the unique seat index caught a concurrent join from another process
            Err(GameError::Core(e)) if e.is_constraint_violation() => {
                let conn = self.storage.get_connection().await;
                match already_in_game(&conn, fid)? {
                    Some(conflict) => Err(conflict),
                    None => Err(GameError::Core(e)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Looks the birthday up once and joins with it.
    pub async fn join_with_oracle(
        &self,
        fid: Fid,
        wallet: &str,
        oracle: &dyn BirthdayOracle,
    ) -> Result<(Game, Player)> {
        if fid == 0 {
            return Err(GameError::MissingField("fid"));
        }

        // skip the oracle round-trip for players who are already seated
        {
            let conn = self.storage.get_connection().await;
            if let Some(conflict) = already_in_game(&conn, fid)? {
                return Err(conflict);
            }
        }

        let birthday = oracle.birthday(fid).await?;
        self.join(fid, wallet, birthday).await
    }
}

fn already_in_game(conn: &Connection, fid: Fid) -> Result<Option<GameError>> {
    let Some(player) = player_store::find_active_player(conn, fid)? else {
        return Ok(None);
    };
    let game = game_store::load_game(conn, player.game_id)?
        .ok_or(GameError::GameNotFound(player.game_id))?;
    Ok(Some(GameError::AlreadyInGame {
        fid,
        game: Box::new(game),
        player: Box::new(player),
    }))
}
