use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

use crate::api_server::models::{OkResponse, VaultSetupRequest, VaultStatusResponse, VaultUnlockRequest};
use crate::api_server::state::AppState;
use crate::error::AppResult;
use crate::security::{CSRF_COOKIE, SESSION_COOKIE};
use crate::vault::VaultService;

#[utoipa::path(get, path = "/vault/status", responses((status = 200, body = VaultStatusResponse)))]
pub async fn status(State(state): State<AppState>, jar: CookieJar) -> AppResult<Json<VaultStatusResponse>> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value());
    let status = VaultService::new().status(&state.store, &state.sessions, token)?;
    Ok(Json(VaultStatusResponse { status }))
}

#[utoipa::path(post, path = "/vault/setup", request_body = VaultSetupRequest, responses((status = 201, body = OkResponse)))]
pub async fn setup(
    State(state): State<AppState>,
    Json(request): Json<VaultSetupRequest>,
) -> AppResult<(StatusCode, Json<OkResponse>)> {
    VaultService::new().setup(&state.store, &request.master_password, request.hint)?;
    Ok((StatusCode::CREATED, Json(OkResponse::ok())))
}

#[utoipa::path(post, path = "/vault/unlock", request_body = VaultUnlockRequest, responses((status = 200, body = OkResponse)))]
pub async fn unlock(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<VaultUnlockRequest>,
) -> AppResult<(CookieJar, Json<OkResponse>)> {
    let session = VaultService::new().unlock(&state.store, &state.sessions, &request.master_password)?;

    let max_age = time::Duration::seconds((state.config.app_session_idle_minutes as i64) * 60);
    let session_cookie = Cookie::build((SESSION_COOKIE, session.token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build();
    let csrf_cookie = Cookie::build((CSRF_COOKIE, session.csrf_token.clone()))
        .http_only(false)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build();

    let jar = jar.add(session_cookie).add(csrf_cookie);
    Ok((jar, Json(OkResponse::ok())))
}

#[utoipa::path(post, path = "/vault/lock", responses((status = 204)))]
pub async fn lock(State(state): State<AppState>, jar: CookieJar) -> AppResult<(CookieJar, StatusCode)> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    VaultService::new().lock(&state.store, &state.sessions, token.as_deref())?;

    let jar = jar
        .remove(Cookie::from(SESSION_COOKIE))
        .remove(Cookie::from(CSRF_COOKIE));
    Ok((jar, StatusCode::NO_CONTENT))
}
