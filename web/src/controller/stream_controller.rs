use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;

use crate::controller::ApiResponse;
use crate::params::stream::{CommentParams, SendEventParams};
use crate::{AppState, Error};
use sse::SessionId;

/// POST one event onto a session's stream.
///
/// Policy drops (throttled, rate-limited, not-subscribed) still return 202:
/// the session accepted the call and applied its drop policy; only an
/// unknown session or an unserializable payload is an error.
pub async fn send_event(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
    Json(params): Json<SendEventParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST new event for session {session_id}");

    let session = app_state.sse_manager.find(&SessionId::from(session_id))?;
    session.send(&params.data, params.send_options())?;

    Ok(StatusCode::ACCEPTED)
}

/// POST a comment record onto a session's stream.
pub async fn send_comment(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
    Json(params): Json<CommentParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST comment for session {session_id}");

    let session = app_state.sse_manager.find(&SessionId::from(session_id))?;
    session.comment(&params.text);

    Ok(StatusCode::ACCEPTED)
}

/// PUT subscribe a session to an event type.
pub async fn subscribe(
    State(app_state): State<AppState>,
    Path((session_id, event_type)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    let session = app_state.sse_manager.find(&SessionId::from(session_id))?;
    session.subscribe(&event_type);

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE unsubscribe a session from an event type.
pub async fn unsubscribe(
    State(app_state): State<AppState>,
    Path((session_id, event_type)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    let session = app_state.sse_manager.find(&SessionId::from(session_id))?;
    session.unsubscribe(&event_type);

    Ok(StatusCode::NO_CONTENT)
}

/// POST acknowledge an event by id.
///
/// A no-op when the id was never recorded; the response reports whether the
/// entry existed.
pub async fn acknowledge(
    State(app_state): State<AppState>,
    Path((session_id, event_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    let session = app_state.sse_manager.find(&SessionId::from(session_id))?;
    let acknowledged = session.acknowledge(&event_id);

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        serde_json::json!({ "acknowledged": acknowledged }),
    )))
}
