use thiserror::Error;

/// The central error type for the Collective simulation.
///
/// This hierarchy enables programmatic recovery and unified error
/// handling across the orchestrator, generation backends, and the
/// streaming layer.
#[derive(Error, Debug)]
pub enum CollectiveError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the generation backends (scenario/asset/chat/combine).
///
/// Image generation is deliberately absent: per the backend contract it
/// never errors, it returns `None` instead.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Backend request failed: {0}")]
    Request(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed backend response: {0}")]
    Malformed(String),

    #[error("Generation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("No backend configured")]
    NotConfigured,
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream transport failed: {0}")]
    Transport(String),

    #[error("Stream ended without completion marker")]
    Truncated,

    #[error("Stream channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Run already in progress")]
    AlreadyRunning,

    #[error("Run was stopped")]
    Stopped,

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CollectiveError::Generation(GenerationError::Timeout { seconds: 30 });
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_error_conversion() {
        let stream_err = StreamError::Truncated;
        let err: CollectiveError = stream_err.into();
        assert!(matches!(err, CollectiveError::Stream(_)));
    }

    #[test]
    fn test_status_error_fields() {
        let err = GenerationError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("unavailable"));
    }
}
