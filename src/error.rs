use thiserror::Error;

/// Error taxonomy for the application.
///
/// Parse and unsupported-file errors surface as inline upload failures,
/// API and transport errors are converted into assistant chat messages,
/// and configuration errors abort startup.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to parse spreadsheet file: {0}")]
    Parse(String),

    #[error("Unsupported file type: {0}. Please upload a valid Excel or CSV file.")]
    UnsupportedFile(String),

    #[error("API Error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Missing configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
