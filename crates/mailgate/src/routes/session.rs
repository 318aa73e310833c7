//! Login, logout and the settings wizard.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use mailgate_core::{Account, validate_account};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{Authed, failure};
use crate::state::{AppState, Connector, close};

const PROVIDER_NOT_FOUND: &str = "Email provider not found. Please fill the values manually.";

/// Checks the credentials against the server and opens a session.
pub async fn login<C: Connector>(State(state): State<Arc<AppState<C>>>, Json(account): Json<Account>) -> Response {
    if let Err(errors) = validate_account(&account) {
        let details: Vec<_> = errors
            .iter()
            .map(|e| json!({ "field": e.field(), "message": e.message() }))
            .collect();
        let message = errors.first().map(|e| e.message()).unwrap_or_default();
        return Json(json!({ "success": false, "message": message, "errors": details })).into_response();
    }

    match state.connector.connect(&account).await {
        Ok(transport) => {
            close(transport).await;
            let email = account.email.clone();
            let token = state.sessions.create(account).await;
            Json(json!({ "success": true, "token": token, "email": email })).into_response()
        }
        Err(err) => {
            warn!(email = %account.email, host = %account.host, error = %err, "login failed");
            failure(&err)
        }
    }
}

/// Ends the session.
pub async fn logout<C: Connector>(State(state): State<Arc<AppState<C>>>, Authed(session): Authed) -> Response {
    state.sessions.remove(&session.token).await;
    info!(email = %session.account.email, "logged out");
    Json(json!({ "success": true })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct WizardRequest {
    email: String,
}

/// Looks up server settings for an email address.
pub async fn wizard<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Json(request): Json<WizardRequest>,
) -> Response {
    match state.autoconfig.detect(&request.email).await {
        Ok(settings) => Json(json!({
            "imap": settings.imap,
            "smtp": settings.smtp,
            "status": 1,
            "msg": "Success, email provider detected.",
        }))
        .into_response(),
        Err(err) => {
            info!(email = %request.email, error = %err, "no mail settings detected");
            Json(json!({ "status": 0, "msg": PROVIDER_NOT_FOUND })).into_response()
        }
    }
}
