use thiserror::Error;

pub type MappingResult<T> = Result<T, MappingError>;

/// Failures that abort the current mapper run. Everything locally
/// recoverable (missing debug info, a failing remote iterator, a skipped
/// object) is logged and degraded instead of surfacing here.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("jdi: {0}")]
    Jdi(#[from] javert_jdi::JdiError),
}
