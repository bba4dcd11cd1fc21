use serde::Serialize;
use utoipa::ToSchema;

/// Connectivity status reported by the `/healthcheck` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Storage is reachable and commands are being processed.
    Ok,
    /// No storage backend is installed; commands are rejected.
    Degraded,
}

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// Report an operational service.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// Report a service running without storage.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}
