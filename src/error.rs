use thiserror::Error;

/// Outcomes of slot operations that are not plain success.
///
/// `NotFound` and `InvalidState` are expected user-facing rejections and
/// are never logged as failures. `Persistence` means the in-memory
/// mutation applied but the durable mirror did not; the caller may warn or
/// retry. `IntegrityAnomaly` flags a broken pool invariant found at
/// runtime; it is logged with detail and resolved deterministically
/// instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("integrity anomaly: {0}")]
    IntegrityAnomaly(String),
}
