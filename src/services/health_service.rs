use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the room store and report whether the service can serve gameplay.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connected = match state.require_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    HealthResponse::from_storage(connected && !state.is_degraded())
}
