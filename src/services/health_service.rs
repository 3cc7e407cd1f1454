use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// `ok` only when a store is installed and answers a ping right now.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Ok(store) = state.require_store().await else {
        return HealthStatus::Degraded.into();
    };

    match store.health_check().await {
        Ok(()) => HealthStatus::Ok.into(),
        Err(err) => {
            warn!(error = %err, "healthcheck ping failed");
            HealthStatus::Degraded.into()
        }
    }
}
