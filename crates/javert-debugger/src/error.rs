use thiserror::Error;

pub type DebugResult<T> = Result<T, DebugError>;

#[derive(Error, Debug)]
pub enum DebugError {
    #[error("failed to launch debuggee: {0}")]
    Launch(String),
    #[error("no debuggee is connected")]
    NotConnected,
    #[error("debuggee disconnected")]
    Disconnected,
    #[error("jdi: {0}")]
    Jdi(#[from] javert_jdi::JdiError),
}
