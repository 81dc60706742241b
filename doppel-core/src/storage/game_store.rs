use crate::error::Result;
use crate::storage::{from_millis, parse_column, to_millis, Storage};
use crate::types::{Game, GameOutcome, GameStatus, COHORT_SIZE};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const GAME_COLUMNS: &str =
    "g.id, g.status, g.created_at, g.resolved_at, g.winning_bet, g.has_birthday_match";

/// A game together with its head counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    #[serde(flatten)]
    pub game: Game,
    pub player_count: usize,
    pub paid_count: usize,
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    let id: String = row.get(0)?;
    let status: String = row.get(1)?;
    let resolved_at: Option<i64> = row.get(3)?;
    let winning_bet: Option<String> = row.get(4)?;
    let has_birthday_match: Option<bool> = row.get(5)?;

    let outcome = match (resolved_at, winning_bet, has_birthday_match) {
        (Some(resolved_at), Some(winning_bet), Some(has_birthday_match)) => Some(GameOutcome {
            resolved_at: from_millis(3, resolved_at)?,
            winning_bet: parse_column(4, "winning_bet", &winning_bet)?,
            has_birthday_match,
        }),
        _ => None,
    };

    Ok(Game {
        id: parse_column(0, "id", &id)?,
        status: parse_column(1, "status", &status)?,
        created_at: from_millis(2, row.get(2)?)?,
        outcome,
    })
}

pub fn insert_game(conn: &Connection, game: &Game) -> Result<()> {
    conn.execute(
        "INSERT INTO games (id, status, created_at) VALUES (?1, ?2, ?3)",
        params![
            game.id.to_string(),
            game.status.as_str(),
            to_millis(&game.created_at)
        ],
    )?;
    Ok(())
}

pub fn load_game(conn: &Connection, game_id: Uuid) -> Result<Option<Game>> {
    let game = conn
        .query_row(
            &format!("SELECT {} FROM games g WHERE g.id = ?1", GAME_COLUMNS),
            params![game_id.to_string()],
            game_from_row,
        )
        .optional()?;
    Ok(game)
}

/// Oldest open game with a free seat. Ties on creation time go to the
/// earlier insert.
pub fn find_open_game(conn: &Connection) -> Result<Option<Game>> {
    let game = conn
        .query_row(
            &format!(
                "SELECT {} FROM games g
                 LEFT JOIN players p ON p.game_id = g.id
                 WHERE g.status = ?1
                 GROUP BY g.id
                 HAVING COUNT(p.id) < ?2
                 ORDER BY g.created_at ASC, g.rowid ASC
                 LIMIT 1",
                GAME_COLUMNS
            ),
            params![GameStatus::Open.as_str(), COHORT_SIZE as i64],
            game_from_row,
        )
        .optional()?;
    Ok(game)
}

pub fn count_players(conn: &Connection, game_id: Uuid) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM players WHERE game_id = ?1",
        params![game_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// OPEN -> FULL. Returns false when the game was not open.
pub fn mark_full(conn: &Connection, game_id: Uuid) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE games SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![
            GameStatus::Full.as_str(),
            game_id.to_string(),
            GameStatus::Open.as_str()
        ],
    )?;
    Ok(updated == 1)
}

/// FULL -> RESOLVED with the outcome written in the same statement. Returns
/// false when the game was not full, which means someone else got there first.
pub fn mark_resolved(conn: &Connection, game_id: Uuid, outcome: &GameOutcome) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE games
         SET status = ?1, resolved_at = ?2, winning_bet = ?3, has_birthday_match = ?4
         WHERE id = ?5 AND status = ?6",
        params![
            GameStatus::Resolved.as_str(),
            to_millis(&outcome.resolved_at),
            outcome.winning_bet.as_str(),
            outcome.has_birthday_match,
            game_id.to_string(),
            GameStatus::Full.as_str()
        ],
    )?;
    Ok(updated == 1)
}

/// Full games in which every seat has paid.
pub fn games_ready_to_resolve(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM games g
         WHERE g.status = ?1
         AND (SELECT COUNT(*) FROM players p WHERE p.game_id = g.id AND p.paid = 1) = ?2
         ORDER BY g.created_at ASC, g.rowid ASC",
        GAME_COLUMNS
    ))?;

    let game_iter = stmt.query_map(
        params![GameStatus::Full.as_str(), COHORT_SIZE as i64],
        game_from_row,
    )?;

    let mut games = Vec::new();
    for game in game_iter {
        games.push(game?);
    }

    Ok(games)
}

pub fn list_games(conn: &Connection, status: Option<GameStatus>) -> Result<Vec<GameSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, COUNT(p.id), COALESCE(SUM(p.paid), 0) FROM games g
         LEFT JOIN players p ON p.game_id = g.id
         WHERE ?1 IS NULL OR g.status = ?1
         GROUP BY g.id
         ORDER BY g.created_at DESC, g.rowid DESC",
        GAME_COLUMNS
    ))?;

    let summary_iter = stmt.query_map(params![status.map(|s| s.as_str())], |row| {
        let player_count: i64 = row.get(6)?;
        let paid_count: i64 = row.get(7)?;
        Ok(GameSummary {
            game: game_from_row(row)?,
            player_count: player_count as usize,
            paid_count: paid_count as usize,
        })
    })?;

    let mut summaries = Vec::new();
    for summary in summary_iter {
        summaries.push(summary?);
    }

    Ok(summaries)
}

pub struct GameStore<'a> {
    storage: &'a Storage,
}

impl<'a> GameStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn load_game(&self, game_id: Uuid) -> Result<Option<Game>> {
        let conn = self.storage.get_connection().await;
        load_game(&conn, game_id)
    }

    pub async fn player_count(&self, game_id: Uuid) -> Result<usize> {
        let conn = self.storage.get_connection().await;
        count_players(&conn, game_id)
    }

    pub async fn games_ready_to_resolve(&self) -> Result<Vec<Game>> {
        let conn = self.storage.get_connection().await;
        games_ready_to_resolve(&conn)
    }

    pub async fn list_games(&self, status: Option<GameStatus>) -> Result<Vec<GameSummary>> {
        let conn = self.storage.get_connection().await;
        list_games(&conn, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BetType, Birthday, Player};
    use crate::storage::player_store;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    async fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("doppel.db")).await.unwrap();
        (dir, storage)
    }

    fn seat(conn: &Connection, game: &Game, fid: u64) {
        let birthday = Birthday::new(1, (fid % 28 + 1) as u8).unwrap();
        let player = Player::new(game.id, fid, format!("0x{:040x}", fid), birthday);
        player_store::insert_player(conn, &player).unwrap();
    }

    #[tokio::test]
    async fn test_find_open_game_prefers_oldest() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let mut older = Game::new();
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = Game::new();
        insert_game(&conn, &newer).unwrap();
        insert_game(&conn, &older).unwrap();

        // the newer game being fuller does not matter
        seat(&conn, &newer, 1);
        seat(&conn, &newer, 2);

        let found = find_open_game(&conn).unwrap().unwrap();
        assert_eq!(found.id, older.id);
    }

    #[tokio::test]
    async fn test_find_open_game_skips_games_without_seats() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let game = Game::new();
        insert_game(&conn, &game).unwrap();
        for fid in 1..=COHORT_SIZE as u64 {
            seat(&conn, &game, fid);
        }

        assert!(find_open_game(&conn).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_transitions_are_guarded() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let game = Game::new();
        insert_game(&conn, &game).unwrap();

        let outcome = GameOutcome {
            resolved_at: Utc::now(),
            winning_bet: BetType::No,
            has_birthday_match: false,
        };
        // cannot resolve an open game
        assert!(!mark_resolved(&conn, game.id, &outcome).unwrap());

        assert!(mark_full(&conn, game.id).unwrap());
        assert!(!mark_full(&conn, game.id).unwrap());

        assert!(mark_resolved(&conn, game.id, &outcome).unwrap());
        assert!(!mark_resolved(&conn, game.id, &outcome).unwrap());

        let loaded = load_game(&conn, game.id).unwrap().unwrap();
        assert_eq!(loaded.status, GameStatus::Resolved);
        let stored = loaded.outcome.unwrap();
        assert_eq!(stored.winning_bet, BetType::No);
        assert!(!stored.has_birthday_match);
    }

    #[tokio::test]
    async fn test_list_games_counts() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let game = Game::new();
        insert_game(&conn, &game).unwrap();
        seat(&conn, &game, 7);
        seat(&conn, &game, 8);

        let all = list_games(&conn, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].player_count, 2);
        assert_eq!(all[0].paid_count, 0);

        assert!(list_games(&conn, Some(GameStatus::Full)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_is_an_error() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let game = Game::new();
        insert_game(&conn, &game).unwrap();
        conn.execute(
            "UPDATE games SET created_at = ?1 WHERE id = ?2",
            params![i64::MAX, game.id.to_string()],
        )
        .unwrap();

        assert!(matches!(
            load_game(&conn, game.id),
            Err(crate::DoppelError::Storage(
                rusqlite::Error::IntegralValueOutOfRange(2, i64::MAX)
            ))
        ));
    }
}
