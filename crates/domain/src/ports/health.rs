use thiserror::Error;

use super::BoxFuture;

#[derive(Debug, Error)]
#[error("{backend} unavailable: {reason}")]
pub struct ProbeError {
    pub backend: &'static str,
    pub reason: String,
}

impl ProbeError {
    pub fn new(backend: &'static str, reason: impl Into<String>) -> Self {
        Self {
            backend,
            reason: reason.into(),
        }
    }
}

/// Liveness probe for a backing service, reported by the health endpoint.
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &'static str;
    fn probe(&self) -> BoxFuture<'_, Result<(), ProbeError>>;
}
