use thiserror::Error;

/// Main error type for the Hyperband tuner
#[derive(Error, Debug)]
pub enum HbError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Evaluation failed at resource {resource}: {message}")]
    EvaluationFailed { resource: f64, message: String },

    #[error("No configurations were evaluated; check the sampler and the (R, eta) settings")]
    NoResult,

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Worker pool and task dispatch errors
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Task panicked: {message}")]
    TaskPanicked { message: String },

    #[error("Task result was dropped before completion")]
    ResultDropped,

    #[error("Failed to start worker pool: {message}")]
    PoolBuild { message: String },
}

impl HbError {
    /// Wrap an evaluator failure for the given resource level.
    pub fn evaluation(resource: f64, message: impl Into<String>) -> Self {
        HbError::EvaluationFailed {
            resource,
            message: message.into(),
        }
    }
}

/// Result type alias for Hyperband operations
pub type HbResult<T> = Result<T, HbError>;

/// Macro for creating invalid-parameter errors
#[macro_export]
macro_rules! invalid_parameter {
    ($($arg:tt)*) => {
        $crate::HbError::InvalidParameter(format!($($arg)*))
    };
}

/// Macro for creating invalid-argument errors
#[macro_export]
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        $crate::HbError::InvalidArgument(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HbError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HbError::evaluation(27.0, "diverged");
        assert!(error.to_string().contains("Evaluation failed"));
        assert!(error.to_string().contains("27"));
        assert!(error.to_string().contains("diverged"));
    }

    #[test]
    fn test_error_conversion() {
        let hb_error: HbError = ExecutorError::ResultDropped.into();

        match hb_error {
            HbError::Executor(ExecutorError::ResultDropped) => (),
            _ => panic!("Expected Executor error"),
        }
    }

    #[test]
    fn test_macros() {
        let err = invalid_parameter!("R is {:.2}, but it must be >= 1.0", 0.5);
        assert!(matches!(err, HbError::InvalidParameter(ref m) if m.contains("0.50")));
        let err = invalid_argument!("k = {}", 0);
        assert!(matches!(err, HbError::InvalidArgument(_)));
        let _config_err = config_error!("Missing required field: {}", "max_resource");
    }
}
