use thiserror::Error;

/// Main error type for the model core
#[derive(Error, Debug)]
pub enum A3cError {
    // Frame construction errors
    #[error("Empty frame bin {bin}: no price points in ({lower}, {upper}]")]
    EmptyBin { bin: usize, lower: i64, upper: i64 },

    #[error("Invalid frame window: {0}")]
    InvalidWindow(String),

    #[error("Frame size mismatch: expected {expected}, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    // Network errors
    #[error("Invalid network topology: {0}")]
    InvalidTopology(String),

    #[error("Gradient shape mismatch for {parameter}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        parameter: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Unknown network parameter: {0}")]
    UnknownParameter(String),

    #[error("Error signal for the {head} head has {actual} entries, expected {expected}")]
    ErrorSignal {
        head: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Tensor error: {0}")]
    Tensor(String),

    // Training errors
    #[error("Invalid trajectory: {0}")]
    InvalidTrajectory(String),

    // Persistence errors
    #[error("Model record error: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    #[error("Invalid model id: {0:?}")]
    InvalidModelId(String),

    #[error("Malformed model snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Model snapshot already exists: {0}")]
    ModelExists(String),

    // Data store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Store unavailable: {operation} failed after {attempts} attempts: {reason}")]
    StoreUnavailable {
        operation: String,
        attempts: u32,
        reason: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl A3cError {
    /// Whether a data-store call failing with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            A3cError::Io(_) | A3cError::Timeout { .. } => true,
            A3cError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Protocol(_)
            ),
            _ => false,
        }
    }
}

/// Result type alias for A3cError
pub type Result<T> = std::result::Result<T, A3cError>;
