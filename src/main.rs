//! Cyclewise - cycle-phase tracking and symptom insights.
//!
//! # API Endpoints
//!
//! - `PUT /users/:user_id/profile` - Create or replace a profile
//! - `GET /users/:user_id/profile` - Fetch a profile
//! - `GET /users/:user_id/cycle-status` - Current phase and countdowns
//! - `POST /users/:user_id/symptoms` - Log a symptom
//! - `GET /users/:user_id/symptoms` - Most recent symptoms
//! - `GET /users/:user_id/symptoms/analysis` - Summary of the recent window
//! - `POST /users/:user_id/insights` - Generate wellness insights
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cyclewise::api::{AppState, router};
use cyclewise::config::Config;
use cyclewise::gemini::GeminiClient;
use cyclewise::insights::TextGenerator;
use cyclewise::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // PRIVACY NOTE: Default log level is INFO; prompts and symptom labels are only ever counted
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("cyclewise=info".parse()?))
        .init();

    let config = Config::from_env();

    info!(
        port = config.port,
        db_url = %config.database_url,
        symptom_window_days = config.symptom_window_days,
        "Starting Cyclewise server"
    );

    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    let generator: Option<Arc<dyn TextGenerator>> = match &config.gemini_api_key {
        Some(key) => {
            let client = GeminiClient::with_base_url(
                &config.gemini_base_url,
                key,
                &config.gemini_model,
                config.ai_timeout(),
            )?;
            info!(model = %config.gemini_model, "Insights enabled");
            Some(Arc::new(client))
        }
        None => {
            warn!("GEMINI_API_KEY not set; insights endpoint disabled");
            None
        }
    };

    let state = AppState {
        storage,
        generator,
        symptom_window_days: config.symptom_window_days,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Cyclewise is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
