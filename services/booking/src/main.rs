use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod booking;
mod error;
mod oauth;
mod routes;
mod session;
mod settings;
mod state;
mod views;

use tokio::net::TcpListener;

use crate::{settings::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env file if there is one
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting booking service");

    let config = AppConfig::from_env()?;
    let app_state = AppState::new(&config)?;

    info!("Booking service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("Booking service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
