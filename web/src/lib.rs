use log::*;
use tokio::net::TcpListener;

mod controller;
mod error;
mod params;
pub mod router;
mod stream;

pub use error::{Error, Result};
pub use service::AppState;

/// Bind the configured interface and serve the router until the process is
/// stopped.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = app_state.config.port;
    let listen_address = format!("{interface}:{port}");

    let router = router::define_routes(app_state);

    let listener = TcpListener::bind(&listen_address).await?;
    info!("Server starting... listening for connections on http://{listen_address}");

    axum::serve(listener, router).await
}
