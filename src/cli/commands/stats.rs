//! `stats` and `leaderboard` command handlers
//!
//! Read-only views over the configured stats store.

use std::path::Path;

use crate::cli::args::{LeaderboardArgs, OutputFormat, StatsArgs};
use crate::cli::commands::load_config;
use crate::duel::{GuildId, UserId};
use crate::error::DuelJackError;
use crate::stats::{JsonFileStatsRepository, StatsRepository, UserStats};

/// Print one user's stats.
///
/// # Errors
///
/// Returns a usage error if the configuration names no stats file, or a
/// config/stats error if either cannot be loaded.
pub async fn show_stats(args: &StatsArgs) -> Result<(), DuelJackError> {
    let (repo, guild) = open(&args.config).await?;
    let user = UserId(args.user);
    let stats = repo.get_stats(guild, user).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Human => match stats {
            Some(s) => println!("{}", describe(&s)),
            None => println!("user {user} has not dueled yet"),
        },
    }
    Ok(())
}

/// Print the leaderboard.
///
/// # Errors
///
/// As [`show_stats`].
pub async fn show_leaderboard(args: &LeaderboardArgs) -> Result<(), DuelJackError> {
    let (repo, guild) = open(&args.config).await?;
    let board = repo.get_leaderboard(guild, args.limit).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&board)?),
        OutputFormat::Human => {
            if board.is_empty() {
                println!("no duels recorded");
            }
            for (rank, s) in board.iter().enumerate() {
                println!("{:>3}. {}", rank + 1, describe(s));
            }
        }
    }
    Ok(())
}

async fn open(config: &Path) -> Result<(JsonFileStatsRepository, GuildId), DuelJackError> {
    let config = load_config(config)?;
    let Some(path) = config.stats.path.as_ref() else {
        return Err(DuelJackError::Usage(
            "configuration has no stats.path; nothing to read".to_string(),
        ));
    };
    Ok((JsonFileStatsRepository::open(path).await?, config.stats.guild))
}

fn describe(s: &UserStats) -> String {
    format!(
        "user {}: level {} ({} xp), {}W/{}L/{}D, streak {} (best {}), win rate {:.0}%",
        s.user,
        s.level,
        s.experience,
        s.wins,
        s.losses,
        s.draws,
        s.win_streak,
        s.best_win_streak,
        s.win_rate() * 100.0
    )
}
