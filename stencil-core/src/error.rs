use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuideError {
    #[error("pattern syntax error: {0}")]
    PatternSyntax(String),

    #[error("unsupported schema construct `{construct}` at {path}")]
    UnsupportedSchema { construct: String, path: String },

    #[error("compilation exceeded budget of {budget:?}")]
    CompilationTimeout { budget: Duration },

    #[error("state {0} does not belong to the backing automaton")]
    InvalidState(u32),

    #[error("token {token_id} is not allowed from state {state}")]
    InvalidTransition { state: u32, token_id: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GuideError {
    /// Duplicate an error so a single failed build can be delivered to every
    /// caller waiting on it. `Json` carries a non-cloneable source and
    /// collapses to `Internal` with the same message.
    pub fn duplicate(&self) -> Self {
        match self {
            Self::PatternSyntax(msg) => Self::PatternSyntax(msg.clone()),
            Self::UnsupportedSchema { construct, path } => Self::UnsupportedSchema {
                construct: construct.clone(),
                path: path.clone(),
            },
            Self::CompilationTimeout { budget } => Self::CompilationTimeout { budget: *budget },
            Self::InvalidState(state) => Self::InvalidState(*state),
            Self::InvalidTransition { state, token_id } => Self::InvalidTransition {
                state: *state,
                token_id: *token_id,
            },
            Self::Json(e) => Self::Internal(format!("JSON error: {e}")),
            Self::Internal(msg) => Self::Internal(msg.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;
