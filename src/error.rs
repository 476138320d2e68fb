/// Unified error type for the join engine
/// Provides structured error handling with categories for different failure modes
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Parse errors: malformed query text
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        query: Option<String>,
    },

    /// Planning errors: unresolvable columns, disconnected join graphs
    #[error("Planning error: {message}")]
    Planning {
        message: String,
        context: Option<String>,
    },

    /// Execution errors: operator failures, invalid state
    #[error("Execution error: {message}")]
    Execution {
        message: String,
        operator: Option<String>,
        phase: Option<String>,
    },

    /// IO errors: relation file operations
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// Internal errors: should never happen, indicates bug
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

impl EngineError {
    pub fn parse(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            query: Some(query.into()),
        }
    }

    pub fn planning(message: impl Into<String>) -> Self {
        Self::Planning {
            message: message.into(),
            context: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            operator: None,
            phase: None,
        }
    }

    pub fn execution_in(
        message: impl Into<String>,
        operator: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            operator: Some(operator.into()),
            phase: Some(phase.into()),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
        }
    }

    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Planning { context: ctx, .. } => *ctx = Some(context.into()),
            Self::Internal { context: ctx, .. } => *ctx = Some(context.into()),
            _ => {}
        }
        self
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
