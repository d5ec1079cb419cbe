use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use growth_engine::config::Config;
use growth_engine::db::{self, SqliteNotifier};
use growth_engine::error::Result;
use growth_engine::runner::AnalyticsRunner;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    info!(
        "Scoring every {}s: window={}d forecast={}mo release_weeks={} concurrency={} cache_ttl={}h",
        cfg.cycle_interval_secs,
        cfg.scoring_window_days,
        cfg.forecast_months,
        cfg.release_weeks_ahead,
        cfg.max_concurrent_artists,
        cfg.result_ttl_hours,
    );

    let runner = AnalyticsRunner::new(cfg, pool.clone(), SqliteNotifier::new(pool));

    // --- Startup cycle, then the interval loop ---
    match runner.run_cycle(Utc::now()).await {
        Ok(summary) if summary.artists == 0 => {
            warn!("No active artists. Insert rows into `artists` to start scoring.");
        }
        Ok(_) => {}
        Err(e) => error!("Startup cycle error: {e}"),
    }

    tokio::select! {
        _ = runner.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
