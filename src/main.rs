//! Leaderboard Server
//!
//! Builds the engine from environment configuration and runs a short
//! demo session against it.

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use leaderboard::{EngineConfig, LeaderboardEngine, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Leaderboard Server v{}", VERSION);

    let config = EngineConfig::from_env();
    match &config.ledger_path {
        Some(path) => info!("Ledger: {}", path.display()),
        None => info!("Ledger: in-memory"),
    }

    let engine = LeaderboardEngine::from_config(&config).await?;
    demo_session(&engine).await
}

/// Demo function to exercise submission and queries.
async fn demo_session(engine: &LeaderboardEngine) -> anyhow::Result<()> {
    info!("=== Submitting Scores ===");

    let submissions = [
        ("alice", "chess", 100),
        ("bob", "chess", 150),
        ("carol", "go", 120),
        ("alice", "go", 80),
        ("dave", "chess", 150),
        ("mallory", "chess", -10),
    ];

    for (user, game, score) in submissions {
        match engine.submit(user, game, score).await {
            Ok(event) => info!("Recorded {} for {} in {} ({})", score, user, game, event.event_id),
            Err(e) => warn!("Rejected {} for {} in {}: {}", score, user, game, e),
        }
    }

    info!("=== Global Leaderboard ===");
    for row in engine.global_page(0, 10).await? {
        info!("#{}: {} - Score: {}", row.rank, row.user_id, row.score);
    }

    for game in ["chess", "go"] {
        info!("=== {} Leaderboard ===", game);
        for row in engine.game_leaderboard(game).await? {
            info!("#{}: {} - Score: {}", row.rank, row.user_id, row.score);
        }
    }

    info!("=== Ranks ===");
    for user in ["alice", "dave", "mallory"] {
        let rank = engine.my_rank(user).await?;
        info!("{}: {}", user, i64::from(rank));
    }

    Ok(())
}
