//! Error type shared by the CatScan crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or unreadable service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else, including stored values that no longer decode
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short label safe to expose in error bodies; never carries the inner message.
    pub fn category(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(_) => "database error",
            Error::Io(_) => "io error",
            Error::Config(_) => "configuration error",
            Error::Internal(_) => "internal error",
        }
    }
}
