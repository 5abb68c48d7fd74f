use crate::resolver::ResolveError;
use crate::vm::{ExecutionError, InternalError, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("tee write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<LogError> for ExecutionError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::Io(err) => ExecutionError::new(RuntimeError::Io {
                message: err.to_string(),
            }),
            LogError::Resolve(err) => ExecutionError::new(InternalError::StackInconsistency(err)),
        }
    }
}
