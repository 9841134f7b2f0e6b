use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Client not found in portal: {0}")]
    ClientNotFound(String),

    #[error("Malformed client name: {0:?}")]
    MalformedName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue source error: {0}")]
    QueueSource(String),

    #[error("Profile extraction failed: {0}")]
    ExtractFailed(String),

    #[error("Document export failed: {0}")]
    ExportFailed(String),

    #[error("WebDriver command error: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("WebDriver session error: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
