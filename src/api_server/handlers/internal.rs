//! Supplemented from `original_source/.../routes/csrf_probe.py`: a no-op,
//! state-changing endpoint that exists solely to exercise the CSRF gate in
//! isolation from vault business logic. Undocumented in the OpenAPI schema.

use axum::http::StatusCode;

pub async fn csrf_probe() -> StatusCode {
    StatusCode::NO_CONTENT
}
