use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No target given")]
    EmptyTarget,

    #[error("A scan is already running ({})", scan_id.as_deref().unwrap_or("pending"))]
    ScanInProgress { scan_id: Option<String> },

    #[error("{0}")]
    ScanFailed(String),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No report available: {0}")]
    NoReport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Reporting error: {0}")]
    Reporting(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ScanError {
    /// Message surfaced to the user when a request fails before a scan id exists.
    ///
    /// Backend rejections carry their own `error` text; anything that never got
    /// an HTTP answer is reported as a network problem.
    pub fn start_failure_message(&self) -> String {
        match self {
            ScanError::Backend { message, .. } if !message.is_empty() => message.clone(),
            ScanError::Backend { .. } | ScanError::MalformedResponse(_) => {
                "Failed to start scan".to_string()
            }
            _ => "Network error starting scan".to_string(),
        }
    }
}
