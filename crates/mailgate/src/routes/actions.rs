//! Trash, spam, star, move and copy.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use mailgate_core::mutator::{self, Outcome};
use mailgate_imap::Uid;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Authed, open, parse_uids, truthy};
use crate::state::{AppState, Connector, close};

#[derive(Debug, Deserialize)]
pub struct TrashRequest {
    uid: Value,
    curfolder: String,
    trash: String,
}

#[derive(Debug, Deserialize)]
pub struct SpamRequest {
    uid: Value,
    curfolder: String,
    spam: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarRequest {
    uid: Value,
    cur_folder: String,
    #[serde(default)]
    starred_folder: String,
    email_state: Value,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    uid: Value,
    curfolder: String,
    destination: String,
}

/// Parses the UIDs, runs `$op` on a fresh transport and answers with its
/// [`Outcome`].
macro_rules! mutate {
    ($state:expr, $session:expr, $uid:expr, |$transport:ident, $uids:ident| $op:expr) => {{
        let $uids: Vec<Uid> = parse_uids($uid);
        if $uids.is_empty() {
            debug!("no message ids given");
            return Json(Outcome::failed()).into_response();
        }
        let mut $transport = match open(&$state, &$session).await {
            Ok(t) => t,
            Err(response) => return response,
        };
        let outcome: Outcome = $op.await;
        close($transport).await;
        Json(outcome).into_response()
    }};
}

/// Moves to trash, or deletes for good inside trash.
pub async fn trash<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<TrashRequest>,
) -> Response {
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::trash(&mut transport, &uids, &request.curfolder, &request.trash)
    })
}

/// Moves out of trash into the current folder.
pub async fn untrash<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<TrashRequest>,
) -> Response {
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::untrash(&mut transport, &uids, &request.curfolder, &request.trash)
    })
}

/// Moves to spam.
pub async fn spam<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<SpamRequest>,
) -> Response {
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::spam(&mut transport, &uids, &request.curfolder, &request.spam)
    })
}

/// Moves out of spam into the current folder.
pub async fn unspam<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<SpamRequest>,
) -> Response {
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::unspam(&mut transport, &uids, &request.curfolder, &request.spam)
    })
}

/// Stars or unstars by moving in or out of the starred folder.
pub async fn star<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<StarRequest>,
) -> Response {
    let star = truthy(&request.email_state);
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::star(&mut transport, &uids, &request.cur_folder, &request.starred_folder, star)
    })
}

/// Moves between any two folders.
pub async fn move_messages<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<TransferRequest>,
) -> Response {
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::move_to(&mut transport, &request.curfolder, &request.destination, &uids)
    })
}

/// Copies into another folder, creating it when missing.
pub async fn copy<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    Json(request): Json<TransferRequest>,
) -> Response {
    mutate!(state, session, &request.uid, |transport, uids| {
        mutator::copy_to(&mut transport, &request.curfolder, &request.destination, &uids)
    })
}
