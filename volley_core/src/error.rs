use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum VolleyError {
    #[error("session setup failed: {0}")]
    Session(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing target instant")]
    MissingTarget,
    #[error("invalid schedule: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
