use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use doppel_core::{Fid, GameStatus};
use doppel_game::{DoppelGame, GameError, Result, StatusReport};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

pub async fn join(game: &DoppelGame, fid: Fid, wallet: &str, birthday: Option<&str>) -> Result<()> {
    let (joined, player) = match birthday {
        Some(birthday) => game.join(fid, wallet, birthday).await?,
        None => game.join_with_oracle(fid, wallet).await?,
    };

    println!("Joined game {}", joined.id);
    println!("Player ID: {}", player.id);
    println!("Game status: {}", joined.status);
    println!();
    println!("Place your bet with: doppel bet {} <yes|no>", player.id);
    Ok(())
}

pub async fn bet(game: &DoppelGame, player_id: Uuid, bet: &str) -> Result<()> {
    let player = game.place_bet(player_id, bet).await?;
    if let Some(bet) = player.bet {
        println!("Bet '{}' recorded for player {}", bet, player.id);
    }
    if !player.paid {
        println!(
            "Pay {} USDC and confirm with: doppel pay {} <transaction-hash>",
            game.config().entry_price,
            player.id
        );
    }
    Ok(())
}

pub async fn pay(game: &DoppelGame, player_id: Uuid, transaction_hash: &str) -> Result<()> {
    let player = game.record_payment(player_id, transaction_hash).await?;
    println!("Payment recorded for player {}", player.id);
    println!("Waiting for the game to fill up and resolve.");
    Ok(())
}

pub async fn cancel(game: &DoppelGame, player_id: Uuid, force: bool) -> Result<()> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Leave the game as player {}?", player_id))
            .default(false)
            .interact()
            .map_err(|e| GameError::internal(e.to_string()))?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    game.cancel(player_id).await?;
    println!("Player {} left the game", player_id);
    Ok(())
}

pub async fn status(game: &DoppelGame, game_id: Option<Uuid>, fid: Option<Fid>) -> Result<()> {
    let report = game.get_status(game_id, fid).await?;
    print_status(&report);
    Ok(())
}

fn print_status(report: &StatusReport) {
    let Some(game) = &report.game else {
        println!("No game found.");
        println!("Join one with: doppel join <fid> <wallet>");
        return;
    };

    println!("Game: {}", game.id);
    println!("Status: {}", game.status);
    println!("Created: {}", game.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(outcome) = &game.outcome {
        println!(
            "Birthday match: {}",
            if outcome.has_birthday_match { "yes" } else { "no" }
        );
        println!("Winning bet: {}", outcome.winning_bet);
        println!("Resolved: {}", outcome.resolved_at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(step) = report.step {
        println!("Your step: {}", step);
    }
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["FID", "Player ID", "Birthday", "Bet", "Paid", "Payout"]);

    for player in &report.players {
        table.add_row(vec![
            player.fid.to_string(),
            player.id.to_string(),
            player
                .birthday
                .map(|b| b.to_string())
                .unwrap_or_else(|| "hidden".to_string()),
            player
                .bet
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if player.paid { "yes" } else { "no" }.to_string(),
            player
                .payout
                .map(|p| format!("{} USDC", p))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    println!("Players: {}", report.total_players);
}

pub async fn list(game: &DoppelGame, status: Option<GameStatus>) -> Result<()> {
    let games = game.list_games(status).await?;

    if games.is_empty() {
        println!("No games found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Game ID", "Status", "Players", "Paid", "Created", "Winning Bet"]);

    for summary in games {
        table.add_row(vec![
            summary.game.id.to_string(),
            summary.game.status.to_string(),
            summary.player_count.to_string(),
            summary.paid_count.to_string(),
            summary
                .game
                .created_at
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            summary
                .game
                .outcome
                .map(|o| o.winning_bet.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn resolve(game: &DoppelGame, watch_mode: bool, interval: Option<u64>) -> Result<()> {
    if watch_mode {
        let period = interval
            .map(Duration::from_secs)
            .unwrap_or(game.config().sweep_interval);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        println!("Resolving due games every {}s. Press Ctrl-C to stop.", period.as_secs());
        game.resolver().run_every(period, shutdown_rx).await;
        return Ok(());
    }

    let summaries = game.resolve_due_games().await?;
    if summaries.is_empty() {
        println!("No games ready to resolve.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Game ID",
        "Match",
        "Winning Bet",
        "Winners",
        "Payout Each",
        "Undistributed",
    ]);
    for summary in &summaries {
        table.add_row(vec![
            summary.game_id.to_string(),
            summary.has_birthday_match.to_string(),
            summary.winning_bet.to_string(),
            summary.winner_count.to_string(),
            format!("{} USDC", summary.payout_per_winner),
            format!("{} USDC", summary.undistributed),
        ]);
    }

    println!("{}", table);
    println!("Resolved {} games", summaries.len());
    Ok(())
}
