//! Conversion settings
//!
//! Every key has a default, so a settings file only needs the keys it
//! changes. Flat `key=value` overrides are applied on top with
//! [`Settings::apply_pair`].

use crate::error::{Error, Result};
use crate::policy::{Policy, Violation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Which ends of a text field to strip spaces from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trim {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl Trim {
    pub fn apply(self, bytes: &[u8]) -> &[u8] {
        let is_space = |b: &u8| *b == b' ';
        let begin = match self {
            Trim::Left | Trim::Both => bytes.iter().position(|b| !is_space(b)).unwrap_or(bytes.len()),
            _ => 0,
        };
        let end = match self {
            Trim::Right | Trim::Both => bytes.iter().rposition(|b| !is_space(b)).map_or(0, |i| i + 1),
            _ => bytes.len(),
        };
        if begin >= end {
            &[]
        } else {
            &bytes[begin..end]
        }
    }
}

/// How note-offs are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteOffStyle {
    /// Note-On with velocity 0
    #[default]
    NoteOnZero,
    /// Explicit Note-Off with `noteOffVelocity`
    NoteOff,
}

/// How the ST+ (track start offset) byte of RCP files is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StPlusMode {
    #[default]
    Auto,
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub meta_text_memo: bool,
    pub meta_text_comment: bool,
    pub meta_text_usr_exc: bool,
    pub meta_cue: bool,

    pub trim_track_name: Trim,
    pub trim_text_memo: Trim,
    pub trim_comment: Trim,
    pub trim_usr_exc_memo: Trim,

    pub note_off: NoteOffStyle,
    pub note_off_velocity: u8,

    pub st_plus: StPlusMode,

    pub use_ctrl_file: bool,
    pub ignore_ctrl_file: bool,
    pub reset_before_ctrl: bool,
    pub optimize_ctrl: bool,

    pub ignore_out_of_range: bool,
    pub ignore_wrong_event: bool,

    pub max_loop_nest: usize,
    pub infinity_loop_count: u32,
    pub loop_bomb_threshold: u32,
    /// Events a single loop may expand to before it counts as a bomb
    pub loop_bomb_events: usize,
    pub max_same_measure_jumps: usize,

    pub rol_dev_device_id: u8,
    pub rol_dev_model_id: u8,
    pub yam_dev_device_id: u8,
    pub yam_dev_model_id: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            meta_text_memo: true,
            meta_text_comment: true,
            meta_text_usr_exc: true,
            meta_cue: true,
            trim_track_name: Trim::Both,
            trim_text_memo: Trim::None,
            trim_comment: Trim::None,
            trim_usr_exc_memo: Trim::Both,
            note_off: NoteOffStyle::NoteOnZero,
            note_off_velocity: 64,
            st_plus: StPlusMode::Auto,
            use_ctrl_file: true,
            ignore_ctrl_file: false,
            reset_before_ctrl: true,
            optimize_ctrl: true,
            ignore_out_of_range: true,
            ignore_wrong_event: true,
            max_loop_nest: 5,
            infinity_loop_count: 2,
            loop_bomb_threshold: 4000,
            loop_bomb_events: 100_000,
            max_same_measure_jumps: 16,
            rol_dev_device_id: 0x10,
            rol_dev_model_id: 0x16,
            yam_dev_device_id: 0x10,
            yam_dev_model_id: 0x4c,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load settings from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json(&text)
    }

    /// Apply a single `key=value` override
    ///
    /// Values are read as JSON scalars when possible (`true`, `42`),
    /// `0x`-prefixed hex numbers are accepted, and anything else is taken as
    /// a plain string (`both`, `noteOff`).
    pub fn apply_pair(&mut self, pair: &str) -> Result<()> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::Settings(format!("expected key=value, got '{}'", pair)))?;
        let key = key.trim();
        let value = value.trim();

        let mut object = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => return Err(Error::Settings("settings must serialize to an object".into())),
        };
        let slot = object
            .get_mut(key)
            .ok_or_else(|| Error::Settings(format!("unknown key '{}'", key)))?;

        *slot = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            let n = u64::from_str_radix(hex, 16)
                .map_err(|_| Error::Settings(format!("invalid hex value '{}'", value)))?;
            Value::from(n)
        } else {
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
        };

        *self = serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::Settings(format!("invalid value for '{}': {}", key, e)))?;
        Ok(())
    }

    /// Policy that applies to a violation
    pub fn policy_for(&self, violation: &Violation) -> Policy {
        if violation.is_range_error() {
            Policy::from_ignore_flag(self.ignore_out_of_range)
        } else {
            Policy::from_ignore_flag(self.ignore_wrong_event)
        }
    }

    /// Log or escalate a violation according to the configured policy
    pub fn check(&self, violation: Violation) -> Result<()> {
        self.policy_for(&violation).resolve(violation)
    }
}
