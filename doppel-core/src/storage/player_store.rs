use crate::error::Result;
use crate::storage::{from_millis, parse_column, to_millis, Storage};
use crate::types::{Amount, BetType, Fid, Player};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PLAYER_COLUMNS: &str =
    "id, fid, wallet, birthday, bet, paid, payment_proof, payout, game_id, created_at";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    let id: String = row.get(0)?;
    let fid: i64 = row.get(1)?;
    let birthday: String = row.get(3)?;
    let bet: Option<String> = row.get(4)?;
    let payout: Option<i64> = row.get(7)?;
    let game_id: String = row.get(8)?;

    let bet: Option<BetType> = match bet {
        Some(bet) => Some(parse_column(4, "bet", &bet)?),
        None => None,
    };

    Ok(Player {
        id: parse_column(0, "id", &id)?,
        fid: fid as Fid,
        wallet: row.get(2)?,
        birthday: parse_column(3, "birthday", &birthday)?,
        bet,
        paid: row.get(5)?,
        payment_proof: row.get(6)?,
        payout: payout.map(|units| Amount::from_units(units as u64)),
        game_id: parse_column(8, "game_id", &game_id)?,
        created_at: from_millis(9, row.get(9)?)?,
    })
}

fn query_players(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Player>> {
    let mut stmt = conn.prepare(sql)?;
    let player_iter = stmt.query_map(args, player_from_row)?;

    let mut players = Vec::new();
    for player in player_iter {
        players.push(player?);
    }

    Ok(players)
}

/// Inserts a seat. Fails with a constraint violation when the fid already
/// holds a seat in an unresolved game.
pub fn insert_player(conn: &Connection, player: &Player) -> Result<()> {
    conn.execute(
        "INSERT INTO players
         (id, fid, wallet, birthday, bet, paid, payment_proof, payout, game_id, created_at, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
        params![
            player.id.to_string(),
            player.fid as i64,
            player.wallet,
            player.birthday.to_string(),
            player.bet.map(|b| b.as_str()),
            player.paid,
            player.payment_proof,
            player.payout.map(|p| p.units() as i64),
            player.game_id.to_string(),
            to_millis(&player.created_at),
        ],
    )?;
    Ok(())
}

pub fn load_player(conn: &Connection, player_id: Uuid) -> Result<Option<Player>> {
    let player = conn
        .query_row(
            &format!("SELECT {} FROM players WHERE id = ?1", PLAYER_COLUMNS),
            params![player_id.to_string()],
            player_from_row,
        )
        .optional()?;
    Ok(player)
}

/// The fid's seat in a game that has not been resolved yet, if any.
pub fn find_active_player(conn: &Connection, fid: Fid) -> Result<Option<Player>> {
    let player = conn
        .query_row(
            &format!(
                "SELECT {} FROM players WHERE fid = ?1 AND active = 1",
                PLAYER_COLUMNS
            ),
            params![fid as i64],
            player_from_row,
        )
        .optional()?;
    Ok(player)
}

/// The fid's most recent seat, resolved or not.
pub fn find_latest_player(conn: &Connection, fid: Fid) -> Result<Option<Player>> {
    let player = conn
        .query_row(
            &format!(
                "SELECT {} FROM players WHERE fid = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                PLAYER_COLUMNS
            ),
            params![fid as i64],
            player_from_row,
        )
        .optional()?;
    Ok(player)
}

pub fn game_players(conn: &Connection, game_id: Uuid) -> Result<Vec<Player>> {
    query_players(
        conn,
        &format!(
            "SELECT {} FROM players WHERE game_id = ?1 ORDER BY created_at ASC, rowid ASC",
            PLAYER_COLUMNS
        ),
        params![game_id.to_string()],
    )
}

pub fn set_bet(conn: &Connection, player_id: Uuid, bet: BetType) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE players SET bet = ?1 WHERE id = ?2",
        params![bet.as_str(), player_id.to_string()],
    )?;
    Ok(updated == 1)
}

/// Marks the seat paid and keeps the first proof seen. Returns false when the
/// seat was already paid.
pub fn mark_paid(conn: &Connection, player_id: Uuid, payment_proof: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE players SET paid = 1, payment_proof = ?1 WHERE id = ?2 AND paid = 0",
        params![payment_proof, player_id.to_string()],
    )?;
    Ok(updated == 1)
}

/// Deletes an unpaid seat. Returns false when nothing was deleted.
pub fn delete_unpaid_player(conn: &Connection, player_id: Uuid) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM players WHERE id = ?1 AND paid = 0",
        params![player_id.to_string()],
    )?;
    Ok(deleted == 1)
}

pub fn set_payout(conn: &Connection, player_id: Uuid, payout: Amount) -> Result<()> {
    conn.execute(
        "UPDATE players SET payout = ?1 WHERE id = ?2",
        params![payout.units() as i64, player_id.to_string()],
    )?;
    Ok(())
}

/// Frees every seat of a game so its fids may join another one.
pub fn release_game_seats(conn: &Connection, game_id: Uuid) -> Result<usize> {
    let released = conn.execute(
        "UPDATE players SET active = 0 WHERE game_id = ?1",
        params![game_id.to_string()],
    )?;
    Ok(released)
}

pub struct PlayerStore<'a> {
    storage: &'a Storage,
}

impl<'a> PlayerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn load_player(&self, player_id: Uuid) -> Result<Option<Player>> {
        let conn = self.storage.get_connection().await;
        load_player(&conn, player_id)
    }

    pub async fn find_active_player(&self, fid: Fid) -> Result<Option<Player>> {
        let conn = self.storage.get_connection().await;
        find_active_player(&conn, fid)
    }

    pub async fn game_players(&self, game_id: Uuid) -> Result<Vec<Player>> {
        let conn = self.storage.get_connection().await;
        game_players(&conn, game_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::game_store;
    use crate::types::{Birthday, Game};
    use tempfile::tempdir;

    async fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("doppel.db")).await.unwrap();
        (dir, storage)
    }

    fn birthday(s: &str) -> Birthday {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_player_roundtrip_through_sqlite() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let game = Game::new();
        game_store::insert_game(&conn, &game).unwrap();
        let player = Player::new(game.id, 42, "0xabc", birthday("07-04"));
        insert_player(&conn, &player).unwrap();

        assert!(set_bet(&conn, player.id, BetType::Yes).unwrap());
        assert!(mark_paid(&conn, player.id, "0xtx1").unwrap());
        // second payment keeps the first proof
        assert!(!mark_paid(&conn, player.id, "0xtx2").unwrap());

        let loaded = load_player(&conn, player.id).unwrap().unwrap();
        assert_eq!(loaded.fid, 42);
        assert_eq!(loaded.birthday, birthday("07-04"));
        assert_eq!(loaded.bet, Some(BetType::Yes));
        assert!(loaded.paid);
        assert_eq!(loaded.payment_proof.as_deref(), Some("0xtx1"));
        assert_eq!(loaded.payout, None);
    }

    #[tokio::test]
    async fn test_unique_active_seat_per_fid() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let first = Game::new();
        let second = Game::new();
        game_store::insert_game(&conn, &first).unwrap();
        game_store::insert_game(&conn, &second).unwrap();

        insert_player(&conn, &Player::new(first.id, 9, "0x9", birthday("01-01"))).unwrap();
        let err = insert_player(&conn, &Player::new(second.id, 9, "0x9", birthday("01-01")))
            .unwrap_err();
        assert!(err.is_constraint_violation());

        // once the first game's seats are released the fid may sit again
        release_game_seats(&conn, first.id).unwrap();
        insert_player(&conn, &Player::new(second.id, 9, "0x9", birthday("01-01"))).unwrap();
        assert_eq!(find_active_player(&conn, 9).unwrap().unwrap().game_id, second.id);
        assert_eq!(find_latest_player(&conn, 9).unwrap().unwrap().game_id, second.id);
    }

    #[tokio::test]
    async fn test_delete_only_unpaid() {
        let (_dir, storage) = storage().await;
        let conn = storage.get_connection().await;

        let game = Game::new();
        game_store::insert_game(&conn, &game).unwrap();
        let paid = Player::new(game.id, 1, "0x1", birthday("02-02"));
        let unpaid = Player::new(game.id, 2, "0x2", birthday("03-03"));
        insert_player(&conn, &paid).unwrap();
        insert_player(&conn, &unpaid).unwrap();
        mark_paid(&conn, paid.id, "0xproof").unwrap();

        assert!(!delete_unpaid_player(&conn, paid.id).unwrap());
        assert!(delete_unpaid_player(&conn, unpaid.id).unwrap());
        assert_eq!(game_players(&conn, game.id).unwrap().len(), 1);
    }
}
