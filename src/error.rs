use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// A feed or article lookup matched no row.
    #[error("{0} not found")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] tokio_rusqlite::Error),

    /// Remote document unreachable or unparsable. Network, HTTP-status and
    /// parse failures are deliberately not distinguished.
    #[error("fetch error: {0}")]
    Fetch(anyhow::Error),

    /// A candidate article that cannot be stored (e.g. no usable link).
    #[error("invalid article: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Fetch(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Fetch(err.into())
    }
}

impl From<feed_rs::parser::ParseFeedError> for AppError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        AppError::Fetch(err.into())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
