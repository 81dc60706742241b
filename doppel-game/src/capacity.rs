use doppel_core::storage::game_store;
use doppel_core::{DoppelError, COHORT_SIZE};
use rusqlite::Connection;
use uuid::Uuid;

/// Flips a game from open to full once it holds a whole cohort. Must run on
/// the same transaction as the insert that triggered it. Returns true only
/// for the call that made the transition; repeated calls are harmless.
pub fn check_capacity(conn: &Connection, game_id: Uuid) -> doppel_core::Result<bool> {
    let count = game_store::count_players(conn, game_id)?;

    if count > COHORT_SIZE {
        return Err(DoppelError::internal(format!(
            "game {} holds {} players, more than {}",
            game_id, count, COHORT_SIZE
        )));
    }

    if count < COHORT_SIZE {
        return Ok(false);
    }

    let flipped = game_store::mark_full(conn, game_id)?;
    if flipped {
        tracing::info!("Game {} is full with {} players", game_id, count);
    }
    Ok(flipped)
}
