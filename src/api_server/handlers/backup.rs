use axum::extract::{Multipart, State};
use axum::Json;
use axum_extra::extract::CookieJar;

use crate::api_server::models::BackupExportRequest;
use crate::api_server::state::AppState;
use crate::backup::{self, Envelope, ImportSummary};
use crate::error::{AppError, AppResult};
use crate::security::SESSION_COOKIE;

fn enc_key(state: &AppState, jar: &CookieJar) -> AppResult<[u8; 32]> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value());
    let session = state.sessions.get(token).ok_or(AppError::Unauthorized)?;
    Ok(session.enc_key)
}

#[utoipa::path(post, path = "/backup/export", request_body = BackupExportRequest, responses((status = 200, body = Envelope)))]
pub async fn export(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<BackupExportRequest>,
) -> AppResult<Json<Envelope>> {
    let key = enc_key(&state, &jar)?;
    let envelope = backup::export(&state.store, &key, request.export_password.as_deref())?;
    Ok(Json(envelope))
}

/// Pulls the `file` and optional `password` parts out of a multipart body.
/// Grounded on the original's `UploadFile` + form field pair, re-expressed
/// over `axum::extract::Multipart`.
async fn read_upload(multipart: &mut Multipart) -> (Vec<u8>, Option<String>) {
    let mut file = Vec::new();
    let mut password = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or_default() {
            "file" => {
                if let Ok(bytes) = field.bytes().await {
                    file = bytes.to_vec();
                }
            }
            "password" => {
                if let Ok(text) = field.text().await {
                    if !text.is_empty() {
                        password = Some(text);
                    }
                }
            }
            _ => {}
        }
    }

    (file, password)
}

#[utoipa::path(post, path = "/backup/import/preview", responses((status = 200, body = ImportSummary)))]
pub async fn preview(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> AppResult<Json<ImportSummary>> {
    let key = enc_key(&state, &jar)?;
    let (file, password) = read_upload(&mut multipart).await;
    let summary = backup::preview(&state.store, &key, &file, password.as_deref())?;
    Ok(Json(summary))
}

#[utoipa::path(post, path = "/backup/import/apply", responses((status = 200, body = ImportSummary)))]
pub async fn apply(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> AppResult<Json<ImportSummary>> {
    let key = enc_key(&state, &jar)?;
    let (file, password) = read_upload(&mut multipart).await;
    let summary = backup::apply(&state.store, &key, &file, password.as_deref())?;
    Ok(Json(summary))
}
