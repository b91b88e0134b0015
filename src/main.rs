use log::{error, info};
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!("Starting SSE relay server...");

    let sse_manager = config.session_manager();
    let app_state = AppState::new(config, sse_manager);

    if let Err(e) = web::init_server(app_state).await {
        error!("Failed to start web server: {e}");
        std::process::exit(1);
    }
}
