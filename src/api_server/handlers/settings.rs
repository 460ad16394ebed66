use axum::extract::State;
use axum::Json;
use axum_extra::extract::CookieJar;

use crate::api_server::state::AppState;
use crate::error::{AppError, AppResult};
use crate::security::SESSION_COOKIE;
use crate::settings::{self, SettingsModel};

fn require_session(state: &AppState, jar: &CookieJar) -> AppResult<()> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value());
    state.sessions.get(token).ok_or(AppError::Unauthorized)?;
    Ok(())
}

#[utoipa::path(get, path = "/settings", responses((status = 200, body = SettingsModel)))]
pub async fn get(State(state): State<AppState>, jar: CookieJar) -> AppResult<Json<SettingsModel>> {
    require_session(&state, &jar)?;
    Ok(Json(settings::get(&state.store)?))
}

#[utoipa::path(put, path = "/settings", request_body = SettingsModel, responses((status = 200, body = SettingsModel)))]
pub async fn put(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(model): Json<SettingsModel>,
) -> AppResult<Json<SettingsModel>> {
    require_session(&state, &jar)?;
    Ok(Json(settings::put(&state.store, model)?))
}
