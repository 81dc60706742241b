use crate::{GameError, Result};
use doppel_core::storage::player_store;
use doppel_core::{BetType, Player, Storage};
use std::sync::Arc;
use uuid::Uuid;

/// Bet, payment and withdrawal for a seated player.
pub struct PlayerLifecycle {
    storage: Arc<Storage>,
}

impl PlayerLifecycle {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Records the player's side. Paid players may still switch sides.
    pub async fn place_bet(&self, player_id: Uuid, bet: &str) -> Result<Player> {
        let bet: BetType = bet
            .parse()
            .map_err(|_| GameError::InvalidBetType(bet.to_string()))?;

        let player = self
            .storage
            .with_transaction(|tx| -> Result<Player> {
                let mut player = player_store::load_player(tx, player_id)?
                    .ok_or(GameError::PlayerNotFound(player_id))?;

                if player.bet == Some(bet) {
                    return Ok(player);
                }
                player_store::set_bet(tx, player_id, bet)?;
                player.bet = Some(bet);
                Ok(player)
            })
            .await?;

        tracing::info!("Recorded bet '{}' for player {}", bet, player_id);
        Ok(player)
    }

    /// Marks the player paid. The proof is kept for audit and never checked.
    /// Paying twice is a successful no-op that keeps the first proof.
    pub async fn record_payment(&self, player_id: Uuid, payment_proof: &str) -> Result<Player> {
        let payment_proof = payment_proof.trim();
        if payment_proof.is_empty() {
            return Err(GameError::MissingField("paymentProof"));
        }

        let (player, newly_paid) = self
            .storage
            .with_transaction(|tx| -> Result<(Player, bool)> {
                let mut player = player_store::load_player(tx, player_id)?
                    .ok_or(GameError::PlayerNotFound(player_id))?;

                if player.bet.is_none() {
                    return Err(GameError::BetRequired(player_id));
                }
                if player.paid {
                    return Ok((player, false));
                }

                player_store::mark_paid(tx, player_id, payment_proof)?;
                player.paid = true;
                player.payment_proof = Some(payment_proof.to_string());
                Ok((player, true))
            })
            .await?;

        if newly_paid {
            tracing::info!(
                "Payment recorded: player {}, proof {}",
                player_id,
                payment_proof
            );
        } else {
            tracing::debug!("Player {} already paid, ignoring repeat payment", player_id);
        }
        Ok(player)
    }

    /// Withdraws an unpaid player. The game's status is left alone even if it
    /// drops below a full cohort.
    pub async fn cancel(&self, player_id: Uuid) -> Result<()> {
        let game_id = self
            .storage
            .with_transaction(|tx| -> Result<Uuid> {
                let player = player_store::load_player(tx, player_id)?
                    .ok_or(GameError::PlayerNotFound(player_id))?;

                if player.paid || !player_store::delete_unpaid_player(tx, player_id)? {
                    return Err(GameError::AlreadyPaid(player_id));
                }
                Ok(player.game_id)
            })
            .await?;

        tracing::info!("Player {} removed from game {}", player_id, game_id);
        Ok(())
    }
}
