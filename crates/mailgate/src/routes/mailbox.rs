//! Folder listing, message listing and search, message and attachment
//! fetch.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use mailgate_core::directory::{draft_folder, list_mailboxes};
use mailgate_core::query::{get_messages, list_messages, search_messages};
use mailgate_core::{Error, get_attachment};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Authed, failure, open, parse_uids};
use crate::state::{AppState, Connector, close};

/// Folder paths; records the drafts folder in the session.
pub async fn folders<C: Connector>(State(state): State<Arc<AppState<C>>>, Authed(session): Authed) -> Response {
    let mut transport = match open(&state, &session).await {
        Ok(t) => t,
        Err(response) => return response,
    };
    let result = list_mailboxes(&mut transport).await;
    close(transport).await;

    match result {
        Ok(mailboxes) => {
            if let Some(drafts) = draft_folder(&mailboxes) {
                debug!(mailbox = %drafts.path, "drafts folder recorded");
                state.sessions.set_draft_folder(&session.token, drafts.path.clone()).await;
            }
            let paths: Vec<&str> = mailboxes.iter().map(|m| m.path.as_str()).collect();
            Json(paths).into_response()
        }
        Err(err) => {
            warn!(error = %err, "unable to list folders");
            failure(&err)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    folder: String,
}

/// This week's threads in a folder.
pub async fn emails<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<FolderRequest>,
) -> Response {
    let mut transport = match open(&state, &session).await {
        Ok(t) => t,
        Err(response) => return response,
    };
    let result = list_messages(&mut transport, &request.folder).await;
    close(transport).await;

    match result {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            warn!(mailbox = %request.folder, error = %err, "unable to list messages");
            failure(&err)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    curfolder: String,
    #[serde(default)]
    sterm: String,
}

/// This week's threads containing a term.
pub async fn search<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<SearchRequest>,
) -> Response {
    let mut transport = match open(&state, &session).await {
        Ok(t) => t,
        Err(response) => return response,
    };
    let result = search_messages(&mut transport, &request.curfolder, &request.sterm).await;
    close(transport).await;

    match result {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            warn!(mailbox = %request.curfolder, error = %err, "search failed");
            failure(&err)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    folder: String,
    thread_uids: Value,
}

/// Full messages of a thread.
pub async fn email<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<MessageRequest>,
) -> Response {
    let uids = parse_uids(&request.thread_uids);
    let mut transport = match open(&state, &session).await {
        Ok(t) => t,
        Err(response) => return response,
    };
    let result = get_messages(&mut transport, &request.folder, &uids).await;
    close(transport).await;

    match result {
        Ok(messages) => Json(messages).into_response(),
        Err(err) => {
            warn!(mailbox = %request.folder, error = %err, "unable to fetch messages");
            failure(&err)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    mailbox: String,
    mail_uid: Value,
    part_id: String,
    file_name: String,
}

/// Attachment bytes as a download.
pub async fn attachment<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<AttachmentRequest>,
) -> Response {
    let Some(uid) = parse_uids(&request.mail_uid).first().copied() else {
        return failure(&Error::InvalidInput("mail_uid is required".into()));
    };
    let mut transport = match open(&state, &session).await {
        Ok(t) => t,
        Err(response) => return response,
    };
    let result = get_attachment(&mut transport, &request.mailbox, uid, &request.part_id, &request.file_name).await;
    close(transport).await;

    match result {
        Ok(content) => {
            let content_type = HeaderValue::from_str(&content.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition(&content.file_name))],
                content.data,
            )
                .into_response()
        }
        Err(err) => {
            warn!(mailbox = %request.mailbox, %uid, part = %request.part_id, error = %err, "attachment unavailable");
            failure(&err)
        }
    }
}

/// `attachment` disposition for `file_name`. The quoted `filename` is an
/// ASCII fallback; names with other characters also get an RFC 6266
/// `filename*`.
fn disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    let mut value = format!("attachment; filename=\"{fallback}\"");
    if fallback != file_name {
        value.push_str("; filename*=UTF-8''");
        value.push_str(&urlencoding::encode(file_name));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
