//! Router error types

use spacebrew_core::ParseError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("client name '{0}' already exists")]
    DuplicateName(String),

    #[error("publisher topic '{0}' not found in routes")]
    RouteNotFound(String),

    #[error("route already exists: {publisher} -> {subscriber}")]
    RouteExists {
        publisher: String,
        subscriber: String,
    },

    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: &'static str },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("route file {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to spawn test client: {0}")]
    Spawn(String),

    #[error("invalid registration: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
