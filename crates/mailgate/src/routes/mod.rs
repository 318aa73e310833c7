//! HTTP surface.
//!
//! Every endpoint answers 200 with a JSON status, including logical
//! failures. Only malformed request bodies are rejected with 4xx.

mod actions;
mod draft;
mod mailbox;
mod session;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mailgate_core::{Error, Session};
use mailgate_imap::Uid;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::state::{AppState, Connector};

/// Largest accepted draft form, attachments included.
const DRAFT_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Builds the application router.
pub fn router<C: Connector>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/login", post(session::login::<C>))
        .route("/api/logout", post(session::logout::<C>))
        .route("/api/wizard", post(session::wizard::<C>))
        .route("/api/folders", post(mailbox::folders::<C>))
        .route("/api/emails", post(mailbox::emails::<C>))
        .route("/api/search", post(mailbox::search::<C>))
        .route("/api/email", post(mailbox::email::<C>))
        .route("/api/attachment", post(mailbox::attachment::<C>))
        .route("/api/trash", post(actions::trash::<C>))
        .route("/api/untrash", post(actions::untrash::<C>))
        .route("/api/spam", post(actions::spam::<C>))
        .route("/api/unspam", post(actions::unspam::<C>))
        .route("/api/star", post(actions::star::<C>))
        .route("/api/move", post(actions::move_messages::<C>))
        .route("/api/copy", post(actions::copy::<C>))
        .route(
            "/api/draft",
            post(draft::save::<C>).layer(DefaultBodyLimit::max(DRAFT_BODY_LIMIT)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The session behind the request's bearer token.
pub struct Authed(pub Session);

#[axum::async_trait]
impl<C: Connector> FromRequestParts<Arc<AppState<C>>> for Authed {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState<C>>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(force_logout)?;
        state.sessions.get(token).await.map(Self).ok_or_else(force_logout)
    }
}

/// Tells the client its session is gone.
fn force_logout() -> Response {
    Json(json!({ "success": false, "force_logout": true })).into_response()
}

/// Reports a failed operation.
fn failure(err: &Error) -> Response {
    Json(json!({ "success": false, "message": err.to_string() })).into_response()
}

/// Opens a transport for the session's account.
///
/// Rejected credentials end the session.
async fn open<C: Connector>(state: &AppState<C>, session: &Session) -> Result<C::Transport, Response> {
    match state.connector.connect(&session.account).await {
        Ok(transport) => Ok(transport),
        Err(Error::Authentication(reason)) => {
            warn!(email = %session.account.email, reason, "stored credentials rejected, ending session");
            state.sessions.remove(&session.token).await;
            Err(force_logout())
        }
        Err(err) => {
            error!(email = %session.account.email, error = %err, "unable to reach mail server");
            Err(failure(&err))
        }
    }
}

/// Reads UIDs from a number, an array, a JSON-encoded array string or a
/// comma-separated string.
fn parse_uids(value: &Value) -> Vec<Uid> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .and_then(Uid::new)
            .into_iter()
            .collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ (Value::Array(_) | Value::Number(_))) => parse_uids(&inner),
            _ => s
                .split(',')
                .filter_map(|part| part.trim().parse::<u32>().ok())
                .filter_map(Uid::new)
                .collect(),
        },
        Value::Array(items) => items.iter().flat_map(parse_uids).collect(),
        _ => Vec::new(),
    }
}

/// `1`, `"1"`, `"true"` and `true` are true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}
