use thiserror::Error;

/// Errors raised by the statistics engine and its containers.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected engine configuration, e.g. a window narrower than two tokens.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Vector algebra between records of two different engines. Word ids are
    /// only meaningful inside the engine that assigned them.
    #[error("records belong to different engines")]
    CrossEngineOperation,

    /// An operation the container does not support, such as removing from the
    /// middle of a sparse array.
    #[error("map invariant violation: {0}")]
    MapInvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
