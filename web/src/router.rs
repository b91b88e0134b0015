use crate::controller::{health_check_controller, stream_controller};
use crate::stream::handler::stream_handler;
use crate::AppState;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use axum::Router;
use log::*;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub fn define_routes(app_state: AppState) -> Router {
    let cors_layer = cors_layer(&app_state.config.allowed_origins);

    Router::new()
        .merge(health_routes())
        .merge(stream_routes(app_state))
        .layer(cors_layer)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream_handler))
        .route("/stream/:id/events", post(stream_controller::send_event))
        .route("/stream/:id/comments", post(stream_controller::send_comment))
        .route(
            "/stream/:id/subscriptions/:event_type",
            put(stream_controller::subscribe),
        )
        .route(
            "/stream/:id/subscriptions/:event_type",
            delete(stream_controller::unsubscribe),
        )
        .route(
            "/stream/:id/acknowledgements/:event_id",
            post(stream_controller::acknowledge),
        )
        .with_state(app_state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unparseable CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}
