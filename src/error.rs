use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failure to produce a rendered document for a profile page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("navigation timed out after {0}s")]
    Timeout(u64),
    #[error("blocked by anti-bot interstitial")]
    Blocked,
    #[error("browser failure: {0}")]
    Browser(String),
}

impl From<chromiumoxide::error::CdpError> for NavigationError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        NavigationError::Browser(err.to_string())
    }
}
