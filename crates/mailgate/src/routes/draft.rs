//! Draft saving from a multipart form.

use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use mailgate_core::mutator::{DraftRequest, resolve_draft_folder, save_draft};
use mailgate_imap::Uid;
use mailgate_mime::Attachment;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{Authed, failure, open};
use crate::state::{AppState, Connector, close};

/// A previously uploaded file, as listed in `attachmentURLs`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredFile {
    Entry { file: String },
    Name(String),
}

impl StoredFile {
    fn into_name(self) -> String {
        match self {
            Self::Entry { file } | Self::Name(file) => file,
        }
    }
}

/// Reads the draft form. Uploaded `attachment` files take precedence over
/// `attachmentURLs`.
async fn read_form(mut multipart: Multipart) -> Result<DraftRequest, MultipartError> {
    let mut request = DraftRequest::default();
    let mut stored = String::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "attachment" | "attachment[]" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if !file_name.is_empty() || !data.is_empty() {
                    let file_name = if file_name.is_empty() { "attachment".to_string() } else { file_name };
                    request.uploads.push(Attachment::new(file_name, data.to_vec()));
                }
            }
            "draft_id" => {
                request.draft_id = field.text().await?.trim().parse::<u32>().ok().and_then(Uid::new);
            }
            "to" => request.to = field.text().await?,
            "cc" => request.cc = field.text().await?,
            "bcc" => request.bcc = field.text().await?,
            "subject" => request.subject = field.text().await?,
            "body" => request.body = field.text().await?,
            "attachmentURLs" => stored = field.text().await?,
            _ => {}
        }
    }
    if !stored.trim().is_empty() {
        match serde_json::from_str::<Vec<StoredFile>>(&stored) {
            Ok(files) => request.stored_files = files.into_iter().map(StoredFile::into_name).collect(),
            Err(err) => warn!(error = %err, "ignoring malformed attachmentURLs"),
        }
    }
    Ok(request)
}

/// Saves a draft, replacing `draft_id` when given.
pub async fn save<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Authed(session): Authed,
    multipart: Multipart,
) -> Response {
    let mut request = match read_form(multipart).await {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    request.from.clone_from(&session.account.email);

    let mut transport = match open(&state, &session).await {
        Ok(t) => t,
        Err(response) => return response,
    };
    let saved = async {
        let folder = resolve_draft_folder(&mut transport, session.draft_folder.as_deref()).await?;
        let uid = save_draft(&mut transport, &folder, &state.config.upload_dir, request).await?;
        Ok::<_, mailgate_core::Error>((folder, uid))
    }
    .await;
    close(transport).await;

    match saved {
        Ok((folder, uid)) => {
            if session.draft_folder.is_none() {
                state.sessions.set_draft_folder(&session.token, folder).await;
            }
            info!(email = %session.account.email, %uid, "draft stored");
            Json(json!({ "success": true, "draft": uid.get() })).into_response()
        }
        Err(err) => {
            warn!(email = %session.account.email, error = %err, "unable to save draft");
            failure(&err)
        }
    }
}
