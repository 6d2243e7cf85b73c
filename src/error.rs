use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Launching, connecting to or logging into the application failed.
    /// Nothing can be processed without a session, so this aborts the run.
    #[error("Session error: {0}")]
    Session(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Captcha service error: {0}")]
    Captcha(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether this error must abort the whole run rather than one company.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Session(_) | AppError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
