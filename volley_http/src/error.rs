use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid header name: {0}")]
    HeaderName(String),
    #[error("invalid value for header {0}")]
    HeaderValue(String),
    #[error("invalid url: {0}")]
    Url(String),
    #[error("body encoding: {0}")]
    Body(#[from] serde_json::Error),
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HttpError>;
