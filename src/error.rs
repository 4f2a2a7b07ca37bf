use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("required panel element missing: {0}")]
    MissingElement(&'static str),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("failed to read attachment: {0}")]
    Attachment(#[from] std::io::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
