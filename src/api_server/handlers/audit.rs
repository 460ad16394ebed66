use axum::extract::State;
use axum::Json;
use axum_extra::extract::CookieJar;

use crate::api_server::state::AppState;
use crate::audit::{self, AuditEvent};
use crate::error::{AppError, AppResult};
use crate::security::SESSION_COOKIE;

const DEFAULT_LIMIT: u32 = 200;

#[utoipa::path(get, path = "/audit", responses((status = 200, body = [AuditEvent])))]
pub async fn list(State(state): State<AppState>, jar: CookieJar) -> AppResult<Json<Vec<AuditEvent>>> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value());
    state.sessions.get(token).ok_or(AppError::Unauthorized)?;
    Ok(Json(audit::list(&state.store, DEFAULT_LIMIT)?))
}
