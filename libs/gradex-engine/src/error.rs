use thiserror::Error;

/// Faults the engine is allowed to surface as `Err`.
///
/// Expected grading failures (missing runtime, compile error, per-case
/// timeout, runtime failure, malformed regex) never appear here — they are
/// converted into result records so the public contract stays total.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("sandbox i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("sampler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
