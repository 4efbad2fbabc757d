use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Calendar error: {0}")]
    Calendar(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Presentation error: {0}")]
    Presentation(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}
