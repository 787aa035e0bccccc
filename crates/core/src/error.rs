/// Errors surfaced synchronously by the emulator's entry points.
///
/// Runtime synthesis faults never use this type; they travel
/// asynchronously on the notify channel so the submitter can correlate
/// them to the exact frame and pipeline that failed.
///
/// # Example
/// ```rust
/// use argus_core::prelude::SensorError;
///
/// let err = SensorError::LifecycleMisuse("start_up called twice");
/// assert_eq!(err.code(), "lifecycle_misuse");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// Malformed input detected at the call site; never queued.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Stream combination or profile outside the capability matrix;
    /// reported before any queuing, no partial commit.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    /// Operation called before start-up or after shutdown.
    #[error("lifecycle misuse: {0}")]
    LifecycleMisuse(&'static str),
    /// The pipeline could not carry a request through a capture cycle.
    #[error("pipeline failure: {0}")]
    PipelineFailure(String),
    /// Flush could not reach a quiescent point.
    #[error("flush failed: {0}")]
    FlushFailure(String),
}

impl SensorError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            SensorError::InvalidArgument(_) => "invalid_argument",
            SensorError::UnsupportedConfiguration(_) => "unsupported_configuration",
            SensorError::LifecycleMisuse(_) => "lifecycle_misuse",
            SensorError::PipelineFailure(_) => "pipeline_failure",
            SensorError::FlushFailure(_) => "flush_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            SensorError::InvalidArgument("x"),
            SensorError::UnsupportedConfiguration("y".into()),
            SensorError::LifecycleMisuse("z"),
            SensorError::PipelineFailure("p".into()),
            SensorError::FlushFailure("f".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
