//! Construction-time error type, distinct from [`crate::state::NtripError`]
//! which is a runtime *status*, not a `Result` error.

/// Errors returned directly by fallible constructors (the GGA builder), as
/// opposed to faults reported through callbacks.
#[derive(Debug, thiserror::Error)]
pub enum NtripClientError {
    #[error("invalid coordinate: latitude {0} / longitude {1} out of range")]
    InvalidCoordinate(f64, f64),
}
