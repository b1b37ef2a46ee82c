mod config;
mod demo;
mod error;
mod routes;
mod state;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let dashboard = match demo::monthly_climatology(&config) {
        Ok(dashboard) => dashboard,
        Err(err) => {
            error!(error = %err, "dashboard declaration failed");
            std::process::exit(1);
        }
    };
    info!(
        title = dashboard.title(),
        prefix = dashboard.prefix(),
        layers = dashboard.layers().len(),
        callbacks = dashboard.callbacks().len(),
        "dashboard ready"
    );

    let addr = config.addr;
    let state = AppState::new(dashboard, config);
    tokio::spawn(routes::evict_idle_views(state.clone()));
    let app = routes::build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "maproom server listening");
    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server exited");
        std::process::exit(1);
    }
}
