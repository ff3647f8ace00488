//! Error types for the verse orchestrator and its animations
//!
//! Every fallible library call returns [`Result<T>`]. Animation
//! initialization errors are recovered by the orchestrator, which mounts the
//! placeholder scene instead; everything else propagates to `main`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerseError {
    /// A mount point (stage or control panel) was not attached
    #[error("Mount point missing: {0}")]
    MissingMount(&'static str),

    /// An option had the wrong type or was out of range
    #[error("Invalid option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("Verse {0} is not registered")]
    UnknownVerse(u32),

    #[error("Malformed verse link `{0}`")]
    Route(String),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Graphics(#[from] common::GraphicsError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

impl VerseError {
    pub fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerseError>;
