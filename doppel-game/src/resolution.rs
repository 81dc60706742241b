use crate::{GameError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use doppel_core::storage::{game_store, player_store};
use doppel_core::{
    Amount, BetType, GameOutcome, GameStatus, Notification, Notifier, Player, Storage,
    COHORT_SIZE,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub const RESULT_TITLE: &str = "DoppelGamble Game Results";
const LOSER_BODY: &str = "Game over! Your bet didn't win this time, but try again!";

/// True when at least two players share a birthday.
pub fn has_shared_birthday(players: &[Player]) -> bool {
    let mut seen = HashSet::with_capacity(players.len());
    players.iter().any(|p| !seen.insert(p.birthday))
}

/// Result of settling one cohort, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub has_birthday_match: bool,
    pub winning_bet: BetType,
    pub winners: Vec<Uuid>,
    pub pot: Amount,
    pub payout_per_winner: Amount,
    pub undistributed: Amount,
}

pub fn compute_outcome(players: &[Player], entry_price: Amount) -> Result<Outcome> {
    let has_birthday_match = has_shared_birthday(players);
    let winning_bet = if has_birthday_match {
        BetType::Yes
    } else {
        BetType::No
    };

    let winners: Vec<Uuid> = players
        .iter()
        .filter(|p| p.bet == Some(winning_bet))
        .map(|p| p.id)
        .collect();

    let pot = entry_price
        .checked_mul(COHORT_SIZE as u64)
        .ok_or_else(|| GameError::internal("pot overflows"))?;

    let (payout_per_winner, undistributed) = pot
        .split(winners.len() as u64)
        .unwrap_or((Amount::ZERO, pot));

    Ok(Outcome {
        has_birthday_match,
        winning_bet,
        winners,
        pot,
        payout_per_winner,
        undistributed,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    pub game_id: Uuid,
    pub has_birthday_match: bool,
    pub winning_bet: BetType,
    pub winner_count: usize,
    pub payout_per_winner: Amount,
    pub pot: Amount,
    pub undistributed: Amount,
    pub resolved_at: DateTime<Utc>,
}

/// Settles fully paid cohorts and tells every player how it went.
pub struct ResolutionEngine {
    storage: Arc<Storage>,
    entry_price: Amount,
    notifier: Arc<dyn Notifier>,
}

impl ResolutionEngine {
    pub fn new(storage: Arc<Storage>, entry_price: Amount, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            entry_price,
            notifier,
        }
    }

    /// Resolves one game. `Ok(None)` means the game was not eligible, most
    /// often because another sweep resolved it first.
    pub async fn resolve_game(&self, game_id: Uuid) -> Result<Option<ResolutionSummary>> {
        let entry_price = self.entry_price;

        let settled = self
            .storage
            .with_transaction(|tx| -> Result<Option<(ResolutionSummary, Vec<Player>)>> {
                let game = game_store::load_game(tx, game_id)?
                    .ok_or(GameError::GameNotFound(game_id))?;
                if game.status != GameStatus::Full {
                    return Ok(None);
                }

                let players = player_store::game_players(tx, game_id)?;
                let paid = players.iter().filter(|p| p.paid).count();
                if players.len() != COHORT_SIZE || paid != COHORT_SIZE {
                    return Ok(None);
                }

                let outcome = compute_outcome(&players, entry_price)?;
                let resolved_at = Utc::now().trunc_subsecs(3);
                let recorded = GameOutcome {
                    resolved_at,
                    winning_bet: outcome.winning_bet,
                    has_birthday_match: outcome.has_birthday_match,
                };
                if !game_store::mark_resolved(tx, game_id, &recorded)? {
                    return Ok(None);
                }

                for winner in &outcome.winners {
                    player_store::set_payout(tx, *winner, outcome.payout_per_winner)?;
                }
                player_store::release_game_seats(tx, game_id)?;

                let players = players
                    .into_iter()
                    .map(|mut p| {
                        if outcome.winners.contains(&p.id) {
                            p.payout = Some(outcome.payout_per_winner);
                        }
                        p
                    })
                    .collect();

                let summary = ResolutionSummary {
                    game_id,
                    has_birthday_match: outcome.has_birthday_match,
                    winning_bet: outcome.winning_bet,
                    winner_count: outcome.winners.len(),
                    payout_per_winner: outcome.payout_per_winner,
                    pot: outcome.pot,
                    undistributed: outcome.undistributed,
                    resolved_at,
                };
                Ok(Some((summary, players)))
            })
            .await?;

        let Some((summary, players)) = settled else {
            return Ok(None);
        };

        tracing::info!(
            "Resolved game {}: match={}, winning bet '{}', {} winners at {} USDC each",
            game_id,
            summary.has_birthday_match,
            summary.winning_bet,
            summary.winner_count,
            summary.payout_per_winner
        );
        if !summary.undistributed.is_zero() {
            tracing::info!(
                "Game {} leaves {} USDC undistributed",
                game_id,
                summary.undistributed
            );
        }

        self.notify_players(&players).await;
        Ok(Some(summary))
    }

    async fn notify_players(&self, players: &[Player]) {
        let notifications: Vec<Notification> = players.iter().map(result_notification).collect();

        let sends = notifications.iter().map(|n| self.notifier.notify(n));
        let results = join_all(sends).await;

        for (notification, result) in notifications.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("Failed to notify fid {}: {}", notification.fid, e);
            }
        }
    }
}

fn result_notification(player: &Player) -> Notification {
    let body = match player.payout {
        Some(payout) => format!(
            "Congratulations! You won {} USDC in the birthday paradox game.",
            payout.to_cents_string()
        ),
        None => LOSER_BODY.to_string(),
    };
    Notification {
        fid: player.fid,
        title: RESULT_TITLE.to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doppel_core::{Birthday, Game, RecordingNotifier};

    fn cohort(birthdays: &[&str], bets: &[BetType]) -> Vec<Player> {
        let game = Game::new();
        birthdays
            .iter()
            .zip(bets)
            .enumerate()
            .map(|(i, (birthday, bet))| {
                let mut player =
                    Player::new(game.id, i as u64 + 1, "0xw", birthday.parse().unwrap());
                player.bet = Some(*bet);
                player.paid = true;
                player
            })
            .collect()
    }

    fn distinct_birthdays() -> Vec<String> {
        (1..=COHORT_SIZE as u8)
            .map(|day| Birthday::new(1, day).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_shared_birthday_detection() {
        let birthdays = distinct_birthdays();
        let refs: Vec<&str> = birthdays.iter().map(String::as_str).collect();
        let players = cohort(&refs, &[BetType::No; COHORT_SIZE]);
        assert!(!has_shared_birthday(&players));

        let mut refs = refs.clone();
        refs[5] = "01-01";
        let players = cohort(&refs, &[BetType::No; COHORT_SIZE]);
        assert!(has_shared_birthday(&players));
    }

    #[test]
    fn test_outcome_splits_pot_among_winners() {
        let mut birthdays = distinct_birthdays();
        birthdays[0] = "03-14".to_string();
        birthdays[1] = "03-14".to_string();
        let refs: Vec<&str> = birthdays.iter().map(String::as_str).collect();
        let mut bets = vec![BetType::No; COHORT_SIZE];
        for bet in bets.iter_mut().take(10) {
            *bet = BetType::Yes;
        }
        let players = cohort(&refs, &bets);

        let outcome = compute_outcome(&players, Amount::from_units(500_000)).unwrap();
        assert!(outcome.has_birthday_match);
        assert_eq!(outcome.winning_bet, BetType::Yes);
        assert_eq!(outcome.winners.len(), 10);
        assert_eq!(outcome.pot, Amount::from_units(11_500_000));
        assert_eq!(outcome.payout_per_winner, Amount::from_units(1_150_000));
        assert!(outcome.undistributed.is_zero());
    }

    #[test]
    fn test_outcome_remainder_and_no_winners() {
        let birthdays = distinct_birthdays();
        let refs: Vec<&str> = birthdays.iter().map(String::as_str).collect();
        let mut bets = vec![BetType::Yes; COHORT_SIZE];
        for bet in bets.iter_mut().take(7) {
            *bet = BetType::No;
        }
        let outcome = compute_outcome(&cohort(&refs, &bets), Amount::from_units(1)).unwrap();
        assert_eq!(outcome.winning_bet, BetType::No);
        assert_eq!(outcome.payout_per_winner, Amount::from_units(3));
        assert_eq!(outcome.undistributed, Amount::from_units(2));

        let all_yes = cohort(&refs, &[BetType::Yes; COHORT_SIZE]);
        let outcome = compute_outcome(&all_yes, Amount::from_units(500_000)).unwrap();
        assert!(outcome.winners.is_empty());
        assert!(outcome.payout_per_winner.is_zero());
        assert_eq!(outcome.undistributed, outcome.pot);

        let free = compute_outcome(&all_yes, Amount::ZERO).unwrap();
        assert!(free.pot.is_zero());
    }

    #[test]
    fn test_result_notification_texts() {
        let mut player = Player::new(Uuid::new_v4(), 9, "0xw", Birthday::new(1, 1).unwrap());
        let loser = result_notification(&player);
        assert_eq!(loser.title, RESULT_TITLE);
        assert_eq!(loser.body, LOSER_BODY);

        player.payout = Some(Amount::from_units(1_150_000));
        let winner = result_notification(&player);
        assert_eq!(
            winner.body,
            "Congratulations! You won 1.15 USDC in the birthday paradox game."
        );
        assert_eq!(winner.fid, 9);

        // seven winners of a 0.5 x 23 pot
        player.payout = Some(Amount::from_units(1_642_857));
        assert_eq!(
            result_notification(&player).body,
            "Congratulations! You won 1.64 USDC in the birthday paradox game."
        );
    }

    #[tokio::test]
    async fn test_resolve_game_skips_open_game() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("doppel.db")).await.unwrap());
        let game = Game::new();
        {
            let conn = storage.get_connection().await;
            game_store::insert_game(&conn, &game).unwrap();
        }

        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ResolutionEngine::new(storage, Amount::from_units(500_000), notifier.clone());
        assert!(engine.resolve_game(game.id).await.unwrap().is_none());
        assert!(matches!(
            engine.resolve_game(Uuid::new_v4()).await,
            Err(GameError::GameNotFound(_))
        ));
        assert!(notifier.sent().is_empty());
    }
}
