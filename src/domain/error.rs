//! Domain error types.

/// Top-level error type for etfrotator.
#[derive(Debug, thiserror::Error)]
pub enum RotatorError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient history for {code}: have {observations} observations, need {minimum}")]
    InsufficientHistory {
        code: String,
        observations: usize,
        minimum: usize,
    },

    #[error("insufficient instruments: {found} qualify, need {minimum}")]
    InsufficientInstruments { found: usize, minimum: usize },

    #[error("insufficient trading days: {found} common dates, need {minimum}")]
    InsufficientTradingDays { found: usize, minimum: usize },

    #[error("no instrument has enough history to score")]
    NoScorableInstruments,

    #[error("strategy '{strategy}' is not implemented")]
    UnimplementedStrategy { strategy: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RotatorError {
    /// Run-level failures that a presentation layer reports as "failed" rather
    /// than as an operational error.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            RotatorError::InsufficientHistory { .. }
                | RotatorError::InsufficientInstruments { .. }
                | RotatorError::InsufficientTradingDays { .. }
                | RotatorError::NoScorableInstruments
        )
    }
}

impl From<&RotatorError> for std::process::ExitCode {
    fn from(err: &RotatorError) -> Self {
        let code: u8 = match err {
            RotatorError::Io(_) | RotatorError::Json(_) => 1,
            RotatorError::ConfigParse { .. }
            | RotatorError::ConfigMissing { .. }
            | RotatorError::ConfigInvalid { .. } => 2,
            RotatorError::Data { .. } => 3,
            RotatorError::InsufficientHistory { .. }
            | RotatorError::InsufficientInstruments { .. }
            | RotatorError::InsufficientTradingDays { .. }
            | RotatorError::NoScorableInstruments => 5,
            RotatorError::UnimplementedStrategy { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
