//! Instructor Workflow (sprout-iw) - Main entry point
//!
//! This is the session lifecycle and wrap-up microservice for the Sprout
//! portal: claims and coverage, the join-window gate, the four-step
//! wrap-up workflow, earnings posting, and badge trigger evaluation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sprout_iw::api::{self, AppContext};
use sprout_iw::badges::BadgeEvaluator;
use sprout_iw::earnings::RateTable;
use sprout_iw::session::join_window::DEFAULT_JOIN_LEAD_MINUTES;
use sprout_iw::SharedState;

/// Command-line arguments for sprout-iw
#[derive(Parser, Debug)]
#[command(name = "sprout-iw")]
#[command(about = "Instructor Workflow microservice for Sprout")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5760", env = "SPROUT_IW_PORT")]
    port: u16,

    /// Data folder holding the portal database
    #[arg(short, long, env = "SPROUT_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Minutes before the scheduled start at which online rooms open
    #[arg(long, default_value_t = DEFAULT_JOIN_LEAD_MINUTES, env = "SPROUT_JOIN_LEAD_MINUTES")]
    join_lead_minutes: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprout_iw=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting Sprout Instructor Workflow v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        args.port
    );

    let data_folder = sprout_common::config::resolve_data_folder(
        args.data_folder.as_deref().and_then(|p| p.to_str()),
        "SPROUT_DATA_FOLDER",
    )
    .context("Failed to resolve data folder")?;
    let db_path = sprout_common::config::database_path(&data_folder);
    info!("Database path: {}", db_path.display());

    let db_pool = sprout_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let ctx = AppContext {
        state: Arc::new(SharedState::new()),
        db_pool,
        rates: Arc::new(RateTable::standard()),
        badges: Arc::new(BadgeEvaluator::standard()),
        join_lead_minutes: args.join_lead_minutes,
    };

    api::run(ctx, args.port).await.context("Server error")?;

    Ok(())
}
