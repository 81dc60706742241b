use crate::{GameError, Result};
use doppel_core::storage::{game_store, player_store};
use doppel_core::{Amount, BetType, Birthday, Fid, Game, GameStatus, GameSummary, Player, Storage};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a caller stands in the flow of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStep {
    Welcome,
    Joining,
    Betting,
    Paying,
    Waiting,
    Results,
}

impl fmt::Display for PlayerStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayerStep::Welcome => "welcome",
            PlayerStep::Joining => "joining",
            PlayerStep::Betting => "betting",
            PlayerStep::Paying => "paying",
            PlayerStep::Waiting => "waiting",
            PlayerStep::Results => "results",
        };
        write!(f, "{}", s)
    }
}

pub fn player_step(game: Option<&Game>, player: Option<&Player>) -> PlayerStep {
    let Some(game) = game else {
        return PlayerStep::Welcome;
    };
    let Some(player) = player else {
        return PlayerStep::Joining;
    };

    if game.is_resolved() {
        PlayerStep::Results
    } else if player.bet.is_none() {
        PlayerStep::Betting
    } else if !player.paid {
        PlayerStep::Paying
    } else {
        PlayerStep::Waiting
    }
}

/// A player as shown to other people. The birthday stays hidden until the
/// game is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub fid: Fid,
    pub wallet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<Birthday>,
    pub bet: Option<BetType>,
    pub paid: bool,
    pub payout: Option<Amount>,
    pub game_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PlayerView {
    pub fn new(player: Player, game: &Game) -> Self {
        let birthday = game.is_resolved().then_some(player.birthday);
        Self {
            id: player.id,
            fid: player.fid,
            wallet: player.wallet,
            birthday,
            bet: player.bet,
            paid: player.paid,
            payout: player.payout,
            game_id: player.game_id,
            created_at: player.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub game: Option<Game>,
    pub players: Vec<PlayerView>,
    pub current_player: Option<PlayerView>,
    pub total_players: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<PlayerStep>,
}

/// Read-only view over games and their players.
pub struct StatusQuery {
    storage: Arc<Storage>,
}

impl StatusQuery {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Status of `game_id`, or of the game `fid` is playing (or last played)
    /// when no id is given.
    pub async fn get_status(&self, game_id: Option<Uuid>, fid: Option<Fid>) -> Result<StatusReport> {
        let fid = fid.filter(|fid| *fid != 0);
        let conn = self.storage.get_connection().await;

        let game = match (game_id, fid) {
            (Some(game_id), _) => Some(
                game_store::load_game(&conn, game_id)?.ok_or(GameError::GameNotFound(game_id))?,
            ),
            (None, Some(fid)) => game_for_fid(&conn, fid)?,
            (None, None) => return Err(GameError::MissingField("gameId")),
        };

        let Some(game) = game else {
            return Ok(StatusReport {
                step: Some(PlayerStep::Welcome),
                ..StatusReport::default()
            });
        };

        let players = player_store::game_players(&conn, game.id)?;
        let current = match fid {
            Some(fid) => players.iter().find(|p| p.fid == fid).cloned(),
            None => None,
        };
        drop(conn);

        let step = fid.map(|_| player_step(Some(&game), current.as_ref()));
        let current_player = current.map(|p| PlayerView::new(p, &game));
        let total_players = players.len();
        let players = players
            .into_iter()
            .map(|p| PlayerView::new(p, &game))
            .collect();

        Ok(StatusReport {
            game: Some(game),
            players,
            current_player,
            total_players,
            step,
        })
    }

    pub async fn list_games(&self, status: Option<GameStatus>) -> Result<Vec<GameSummary>> {
        let conn = self.storage.get_connection().await;
        Ok(game_store::list_games(&conn, status)?)
    }
}

fn game_for_fid(conn: &Connection, fid: Fid) -> Result<Option<Game>> {
    let player = match player_store::find_active_player(conn, fid)? {
        Some(player) => Some(player),
        None => player_store::find_latest_player(conn, fid)?,
    };
    match player {
        Some(player) => Ok(game_store::load_game(conn, player.game_id)?),
        None => Ok(None),
    }
}
