pub mod routes;

use crate::backend::Backend;
use crate::config::Config;
use anyhow::{Context, Result};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run_server(config: Arc<Config>, backend: Arc<dyn Backend>) -> Result<()> {
    let port = config.api_port;
    let backend_name = backend.describe();
    let state = routes::ApiState::new(config, backend);
    let app: Router = routes::router(state);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, backend = %backend_name, "Little Learners report API started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}
