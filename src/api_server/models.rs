//! HTTP-layer request/response DTOs not already owned by a service module.
//!
//! Grounded on the teacher's `api_server/models.rs` (thin request/response
//! structs per endpoint, each deriving `ToSchema` for the OpenAPI doc).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VaultStatusResponse {
    pub status: crate::vault::VaultStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VaultSetupRequest {
    #[serde(rename = "masterPassword")]
    pub master_password: String,
    pub hint: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VaultUnlockRequest {
    #[serde(rename = "masterPassword")]
    pub master_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BackupExportRequest {
    #[serde(rename = "exportPassword")]
    pub export_password: Option<String>,
}
