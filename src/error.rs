use crate::policy::Violation;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not a Recomposer song file")]
    NotRecognized,

    #[error("Unexpected end of data at offset {offset:#06x} ({needed} bytes needed)")]
    Truncated { offset: usize, needed: usize },

    #[error("Corrupt track {track}: {message}")]
    CorruptTrack { track: usize, message: String },

    #[error("Invalid Same Measure target offset {offset}")]
    InvalidJump { offset: i64 },

    #[error("Same Measure chain exceeded {0} jumps")]
    SameMeasureChain(usize),

    #[error("Invalid tempo: {0}")]
    InvalidTempo(String),

    #[error("{0}")]
    Violation(Violation),

    #[error("Control file not found: {0}")]
    ControlFileNotFound(String),

    #[error("Control file reader is not specified for '{0}'")]
    NoControlFileReader(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
