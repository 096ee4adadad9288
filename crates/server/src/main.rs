//! Flarecast Server
//!
//! Relays livestream interaction events and profile metadata for a tracked
//! user to a browser overlay over WebSocket, falling back to scraped
//! profile data when the user is not live.

mod logging;
mod normalize;
mod pages;
mod profile;
mod session;
mod state;
mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Router};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use flarecast_source::BridgeSource;

use crate::profile::ProfileFetcher;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "flarecast", about = "Live overlay relay server")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "FLARECAST_HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8000, env = "FLARECAST_PORT")]
    port: u16,

    /// Bridge command used for live event ingestion
    #[arg(long, default_value = "flarecast-bridge", env = "FLARECAST_BRIDGE_CMD")]
    bridge_cmd: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logging = logging::init_logging()?;

    info!(
        component = "server",
        event = "server.starting",
        "Starting Flarecast server..."
    );

    let state = Arc::new(AppState::new(
        ProfileFetcher::new()?,
        Arc::new(BridgeSource::new(args.bridge_cmd)),
    ));

    let app = Router::new()
        .route("/", get(pages::landing))
        .route("/health", get(health_handler))
        .route("/ws/{username}", get(websocket::ws_handler))
        .route("/{username}", get(pages::overlay))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!(
        component = "server",
        event = "server.listening",
        addr = %addr,
        "Listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
