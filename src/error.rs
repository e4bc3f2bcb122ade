use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("render error: {0}")]
    RenderError(String),

    #[error("template parse error: {0}")]
    TemplateParseError(String),

    #[error("route error: {0}")]
    RouteError(String),

    #[error("role configuration error: {0}")]
    RoleConfig(String),

    #[error("serialization error: {0}")]
    SerializeError(String),

    #[error("poisoned lock error: {0}")]
    LockPoisoned(String),

    #[error("io error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializeError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for EngineError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        EngineError::LockPoisoned(err.to_string())
    }
}
