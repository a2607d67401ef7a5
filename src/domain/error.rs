//! Domain error types.

/// Top-level error type for swingtrader.
#[derive(Debug, thiserror::Error)]
pub enum SwingtraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("invalid series: {reason}")]
    InvalidSeries { reason: String },

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("order for {symbol} rejected: {reason}")]
    BrokerRejected { symbol: String, reason: String },

    #[error("broker unavailable: {reason}")]
    BrokerUnavailable { reason: String },

    #[error("cannot price presumed-closed position {symbol}")]
    ReconciliationAmbiguous { symbol: String },

    #[error("a position is already open for {symbol}")]
    PositionExists { symbol: String },

    #[error("record codec error: {reason}")]
    Codec { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SwingtraderError {
    fn from(err: serde_json::Error) -> Self {
        SwingtraderError::Codec {
            reason: err.to_string(),
        }
    }
}

impl From<&SwingtraderError> for std::process::ExitCode {
    fn from(err: &SwingtraderError) -> Self {
        let code: u8 = match err {
            SwingtraderError::Io(_) => 1,
            SwingtraderError::ConfigParse { .. }
            | SwingtraderError::ConfigMissing { .. }
            | SwingtraderError::ConfigInvalid { .. } => 2,
            SwingtraderError::Database { .. }
            | SwingtraderError::DatabaseQuery { .. }
            | SwingtraderError::Codec { .. } => 3,
            SwingtraderError::BrokerRejected { .. }
            | SwingtraderError::BrokerUnavailable { .. }
            | SwingtraderError::ReconciliationAmbiguous { .. } => 4,
            SwingtraderError::InvalidSeries { .. }
            | SwingtraderError::DataUnavailable { .. } => 5,
            SwingtraderError::PositionExists { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
