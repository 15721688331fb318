//! Recomposer song file parsing
//!
//! Three dialects are recognized, tried in this order: RCP (Recomposer 2.x),
//! G36 (Recomposer 3.0) and MCP. The first one whose signature matches wins.

pub mod g36;
pub mod mcp;
pub mod opcode;
pub mod rcp;
pub(crate) mod reader;
pub mod text;

use crate::control::ControlFileKind;
use crate::error::{Error, Result};
use crate::settings::StPlusMode;
use log::{debug, warn};
pub use opcode::{Canonical, Opcode, RawEvent};
use reader::ByteReader;

/// Binary dialect of a song file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Rcp,
    G36,
    Mcp,
}

impl Dialect {
    /// Width of one event record
    pub fn event_len(self) -> usize {
        match self {
            Dialect::Rcp | Dialect::Mcp => 4,
            Dialect::G36 => 6,
        }
    }

    /// Length of the per-track header preceding the event records
    ///
    /// Same Measure offsets are relative to the start of this header.
    pub fn track_header_len(self) -> usize {
        match self {
            Dialect::Rcp => rcp::TRACK_HEADER_LEN,
            Dialect::G36 => g36::TRACK_HEADER_LEN,
            Dialect::Mcp => 0,
        }
    }
}

/// A user exclusive template (UsrExc0-7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserExclusive {
    pub memo: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// Song-wide header fields, read-only once parsed
#[derive(Debug, Clone)]
pub struct HeaderFields {
    pub dialect: Dialect,
    pub title: Vec<u8>,
    pub memo_lines: Vec<Vec<u8>>,
    /// Ticks per quarter note
    pub time_base: u16,
    /// Beats per minute
    pub tempo: u16,
    pub beat_n: u8,
    pub beat_d: u8,
    pub key: u8,
    /// Global transposition
    pub play_bias: i8,
    pub max_tracks: usize,
    /// RCP files storing 0 as their track count (18 tracks implied)
    pub old_track_count: bool,
    pub user_exclusives: Vec<UserExclusive>,
    /// Raw control file names by kind, as stored (legacy codepage)
    pub control_files: Vec<(ControlFileKind, Vec<u8>)>,
}

impl HeaderFields {
    pub fn is_g36(&self) -> bool {
        self.dialect == Dialect::G36
    }

    pub fn is_mcp(&self) -> bool {
        self.dialect == Dialect::Mcp
    }
}

/// Per-track header fields
#[derive(Debug, Clone, Default)]
pub struct TrackHeader {
    pub track_no: u8,
    /// 0-31 (port * 16 + channel), -1 = unset
    pub midi_channel: i8,
    /// Bit 7 set = no transposition, otherwise 7-bit two's complement
    pub key_shift: u8,
    /// Raw ST+ byte, see [`TrackHeader::start_offset`]
    pub st_shift: u8,
    /// Bit 0 = muted
    pub mode: u8,
    pub memo: Vec<u8>,
}

impl TrackHeader {
    pub fn is_muted(&self) -> bool {
        self.mode & 0x01 != 0
    }

    pub fn channel(&self) -> Option<u8> {
        (self.midi_channel >= 0).then(|| self.midi_channel as u8 % 16)
    }

    pub fn port(&self) -> u8 {
        if self.midi_channel >= 0 {
            self.midi_channel as u8 / 16
        } else {
            0
        }
    }

    /// Transposition in semitones, including the song's play bias
    pub fn transposition(&self, play_bias: i8) -> i32 {
        if self.key_shift & 0x80 != 0 {
            return 0;
        }
        let shift = self.key_shift as i32;
        play_bias as i32 + shift - if shift >= 0x40 { 0x80 } else { 0 }
    }

    /// Track start offset in ticks
    pub fn start_offset(&self, header: &HeaderFields, mode: StPlusMode) -> i32 {
        let signed = self.st_shift as i8 as i32;
        let unsigned = self.st_shift as i32;
        match header.dialect {
            Dialect::Mcp => 0,
            Dialect::G36 => signed,
            Dialect::Rcp => match mode {
                StPlusMode::Signed => signed,
                StPlusMode::Unsigned => unsigned,
                // ST+ of 100 and above is stored as a negative offset
                StPlusMode::Auto if header.old_track_count || unsigned >= 100 => signed,
                StPlusMode::Auto => unsigned,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawTrack {
    pub header: TrackHeader,
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone)]
pub struct RawSong {
    pub header: HeaderFields,
    pub tracks: Vec<RawTrack>,
}

/// Parse a song file in any supported dialect
pub fn parse(data: &[u8]) -> Result<RawSong> {
    let song = match rcp::parse(data)? {
        Some(song) => song,
        None => match g36::parse(data)? {
            Some(song) => song,
            None => mcp::parse(data)?.ok_or(Error::NotRecognized)?,
        },
    };

    debug!(
        "Parsed {:?} song: time base {}, tempo {}, {} tracks",
        song.header.dialect,
        song.header.time_base,
        song.header.tempo,
        song.tracks.len()
    );
    Ok(song)
}

/// Field positions of a dialect's track header
pub(crate) struct TrackLayout {
    pub dialect: Dialect,
    pub header_len: usize,
    /// Width of the little-endian size field at offset 0 (2 or 4)
    pub size_width: usize,
    pub track_no: usize,
    pub midi_channel: usize,
    pub key_shift: usize,
    pub st_shift: usize,
    pub mode: usize,
    pub memo: usize,
}

const FOOTER_SIGNATURE: &[u8] = b"RCFW";

/// Read size-prefixed tracks starting at `start`
///
/// A footer or a track running past the end of the buffer ends the track
/// list early. A size smaller than the track header is corruption.
pub(crate) fn read_tracks(
    reader: &ByteReader,
    start: usize,
    max_tracks: usize,
    layout: &TrackLayout,
) -> Result<Vec<RawTrack>> {
    let mut tracks = Vec::new();
    let mut index = start;

    while tracks.len() < max_tracks && index + layout.header_len < reader.len() {
        if reader.has_signature(index, FOOTER_SIGNATURE) {
            break;
        }

        let size = match layout.size_width {
            2 => reader.u16_le_at(index)? as usize,
            _ => reader.u32_le_at(index)? as usize,
        };
        if size < layout.header_len {
            return Err(Error::CorruptTrack {
                track: tracks.len() + 1,
                message: format!("track size {} is smaller than its header", size),
            });
        }
        if index + size > reader.len() {
            warn!("Invalid track size: {}. The rest of the file is ignored.", size);
            break;
        }

        let header = TrackHeader {
            track_no: reader.u8_at(index + layout.track_no)?,
            midi_channel: reader.i8_at(index + layout.midi_channel)?,
            key_shift: reader.u8_at(index + layout.key_shift)?,
            st_shift: reader.u8_at(index + layout.st_shift)?,
            mode: reader.u8_at(index + layout.mode)?,
            memo: reader
                .bytes_at(index + layout.memo, layout.header_len - layout.memo)?
                .to_vec(),
        };

        let body = reader.bytes_at(index + layout.header_len, size - layout.header_len)?;
        tracks.push(RawTrack {
            header,
            events: split_events(body, layout.dialect),
        });

        index += size;
    }

    Ok(tracks)
}

/// Split a track body into fixed-width records, dropping a trailing partial one
pub(crate) fn split_events(body: &[u8], dialect: Dialect) -> Vec<RawEvent> {
    body.chunks_exact(dialect.event_len())
        .map(|chunk| match dialect {
            Dialect::G36 => RawEvent::Six([chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5]]),
            Dialect::Rcp | Dialect::Mcp => RawEvent::Four([chunk[0], chunk[1], chunk[2], chunk[3]]),
        })
        .collect()
}
