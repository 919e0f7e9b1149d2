//! Errors at the crate's fallible boundaries
//!
//! The tick itself never fails. Only configuration, scene loading and the audio
//! worker channel can.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidConfig(String),

    #[error("invalid scene: {0}")]
    InvalidScene(String),

    #[error("unsupported scene version {0:?}")]
    UnsupportedSceneVersion(String),

    #[error("audio worker disconnected")]
    WorkerDisconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
