use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown response category: {0}")]
    UnknownCategory(String),
    #[error("unknown variable status: {0}")]
    UnknownStatus(String),
    #[error("unknown variable kind: {0}")]
    UnknownKind(String),
    #[error("level map for {variable} lists code {code} more than once")]
    DuplicateLevel { variable: String, code: String },
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
