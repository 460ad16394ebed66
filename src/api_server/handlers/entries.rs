use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::api_server::state::AppState;
use crate::entries::{self, Entry, EntryCreate, EntrySummary, EntryUpdate};
use crate::error::{AppError, AppResult};
use crate::security::SESSION_COOKIE;

fn enc_key(state: &AppState, jar: &CookieJar) -> AppResult<[u8; 32]> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value());
    let session = state.sessions.get(token).ok_or(AppError::Unauthorized)?;
    Ok(session.enc_key)
}

#[utoipa::path(get, path = "/entries", responses((status = 200, body = [EntrySummary])))]
pub async fn list(State(state): State<AppState>, jar: CookieJar) -> AppResult<Json<Vec<EntrySummary>>> {
    let key = enc_key(&state, &jar)?;
    Ok(Json(entries::list(&state.store, &key)?))
}

#[utoipa::path(post, path = "/entries", request_body = EntryCreate, responses((status = 201, body = Entry)))]
pub async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<EntryCreate>,
) -> AppResult<(StatusCode, Json<Entry>)> {
    let key = enc_key(&state, &jar)?;
    let entry = entries::create(&state.store, &key, input)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(get, path = "/entries/{id}", responses((status = 200, body = Entry)))]
pub async fn get(State(state): State<AppState>, jar: CookieJar, Path(id): Path<Uuid>) -> AppResult<Json<Entry>> {
    let key = enc_key(&state, &jar)?;
    Ok(Json(entries::get(&state.store, &key, id)?))
}

#[utoipa::path(put, path = "/entries/{id}", request_body = EntryUpdate, responses((status = 200, body = Entry)))]
pub async fn update(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(input): Json<EntryUpdate>,
) -> AppResult<Json<Entry>> {
    let key = enc_key(&state, &jar)?;
    Ok(Json(entries::update(&state.store, &key, id, input)?))
}

#[utoipa::path(delete, path = "/entries/{id}", responses((status = 204)))]
pub async fn delete(State(state): State<AppState>, jar: CookieJar, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    // Deletion does not need the encryption key, but still requires an
    // unlocked session.
    enc_key(&state, &jar)?;
    entries::delete(&state.store, id)?;
    Ok(StatusCode::NO_CONTENT)
}
