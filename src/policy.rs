//! Classification of recoverable anomalies found in legacy song data
//!
//! Validation code only reports a [`Violation`]. Whether it is logged and
//! skipped or escalated into a hard error is decided by the [`Policy`] the
//! caller picks from the settings.

use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// A recoverable anomaly in the input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("Value out of range: {0:?}")]
    OutOfRange(Vec<i32>),

    #[error("Note {0} is out of range due to KEY+ and/or PLAY BIAS")]
    NoteOutOfRange(i32),

    #[error("Unknown event {0:#04x}")]
    UnknownEvent(u8),

    #[error("Unexpected F7 (2nd event) without a leading event")]
    OrphanSecondEvent,

    #[error("Unexpected Loop End event")]
    DanglingLoopEnd,

    #[error("{0}-level of unclosed loop")]
    UnclosedLoop(usize),

    #[error("Invalid rhythm pattern No. {0}")]
    InvalidRhythmPattern(u16),
}

impl Violation {
    /// Whether the anomaly is about a value rather than an event
    pub fn is_range_error(&self) -> bool {
        matches!(self, Violation::OutOfRange(_) | Violation::NoteOutOfRange(_))
    }
}

/// What to do with a [`Violation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Policy {
    /// Log the anomaly and carry on with a safe substitute
    Warn,
    /// Abort the whole conversion
    Error,
}

impl Policy {
    pub fn from_ignore_flag(ignore: bool) -> Self {
        if ignore {
            Policy::Warn
        } else {
            Policy::Error
        }
    }

    /// Apply the policy. `Ok(())` means the caller should skip or substitute.
    pub fn resolve(self, violation: Violation) -> Result<()> {
        match self {
            Policy::Warn => {
                warn!("{}. Ignored.", violation);
                Ok(())
            }
            Policy::Error => Err(Error::Violation(violation)),
        }
    }
}

/// Check that every value fits in a MIDI data byte
pub fn check_7bit(values: &[i32]) -> std::result::Result<(), Violation> {
    if values.iter().all(|&v| (0..0x80).contains(&v)) {
        Ok(())
    } else {
        Err(Violation::OutOfRange(values.to_vec()))
    }
}
