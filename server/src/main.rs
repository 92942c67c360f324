//! SSR host for the partner portal pages.

#![recursion_limit = "256"]

mod routes;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = routes::parse_port(std::env::var("PORT").ok().as_deref()).map_err(ServerError::Config)?;
    let app = routes::app().map_err(ServerError::Config)?;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "portal server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
