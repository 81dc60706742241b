use crate::resolution::{ResolutionEngine, ResolutionSummary};
use crate::Result;
use doppel_core::{GameStore, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Sweeps the store for fully paid games and resolves each one on its own.
#[derive(Clone)]
pub struct BatchResolver {
    storage: Arc<Storage>,
    engine: Arc<ResolutionEngine>,
}

impl BatchResolver {
    pub fn new(storage: Arc<Storage>, engine: Arc<ResolutionEngine>) -> Self {
        Self { storage, engine }
    }

    /// Safe to call as often as wanted. A game that fails is logged and left
    /// for the next sweep.
    pub async fn resolve_due_games(&self) -> Result<Vec<ResolutionSummary>> {
        let due = GameStore::new(&self.storage).games_ready_to_resolve().await?;
        tracing::debug!("Resolver sweep found {} eligible games", due.len());

        let mut summaries = Vec::new();
        for game in due {
            match self.engine.resolve_game(game.id).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => tracing::debug!("Game {} no longer eligible, skipping", game.id),
                Err(e) => tracing::warn!("Failed to resolve game {}: {}", game.id, e),
            }
        }

        Ok(summaries)
    }

    /// Runs a sweep every `period` until `shutdown` turns true or its sender
    /// goes away.
    pub async fn run_every(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("Resolver running every {:?}", period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.resolve_due_games().await {
                        Ok(summaries) if !summaries.is_empty() => {
                            tracing::info!("Resolver sweep settled {} games", summaries.len());
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("Resolver sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Resolver stopped");
    }
}
