use async_stream::stream;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use log::*;
use service::AppState;
use sse::ChannelSink;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Name of the response header carrying the session identity, so a client
/// can address the REST surface without parsing the opening comment.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// SSE handler that establishes a long-lived connection for one client.
/// One session per connection; the session stages the SSE headers and this
/// handler copies them onto the streaming response it builds.
pub(crate) async fn stream_handler(State(app_state): State<AppState>) -> axum::response::Response {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let sink = Arc::new(ChannelSink::new(tx));
    let (close_tx, close_rx) = mpsc::unbounded_channel::<()>();

    let session = app_state.sse_manager.open_session(sink.clone(), close_rx);
    let session_id = session.id().clone();
    debug!("Establishing SSE connection for session {session_id}");

    // The receiver half lives in the response body; once the client goes
    // away it is dropped, which resolves `closed()`. Feed that into the
    // session's close notification and drop the manager's handle.
    let manager = app_state.sse_manager.clone();
    let watch_sink = sink.clone();
    let watch_id = session_id.clone();
    tokio::spawn(async move {
        watch_sink.closed().await;
        debug!("SSE connection closed for session {watch_id}, cleaning up");
        let _ = close_tx.send(());
        manager.close_session(&watch_id);
    });

    // Wire chunks arrive from the session through the channel and pass
    // straight through to the response body.
    let body_stream = stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<_, Infallible>(chunk);
        }
    };

    let mut builder = Response::builder().status(StatusCode::OK);
    for (name, value) in sink.headers() {
        builder = builder.header(name, value);
    }
    builder = builder.header(SESSION_ID_HEADER, session_id.as_str());

    match builder.body(Body::from_stream(body_stream)) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to build SSE response for session {session_id}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
