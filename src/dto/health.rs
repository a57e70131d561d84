use serde::Serialize;
use utoipa::ToSchema;

/// Coarse service status.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Whether a room store is installed and answered the last health check.
    pub storage_connected: bool,
}

impl HealthResponse {
    /// Build the response from the storage state.
    pub fn from_storage(connected: bool) -> Self {
        Self {
            status: if connected {
                HealthStatus::Ok
            } else {
                HealthStatus::Degraded
            },
            storage_connected: connected,
        }
    }
}
