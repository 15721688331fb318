//! MCP dialect
//!
//! MCP files have no text signature and no per-track headers. A fixed set
//! of tracks is stored back to back, each one closed by a Track End record.

use super::reader::ByteReader;
use super::{split_events, Dialect, HeaderFields, Opcode, RawSong, RawTrack, TrackHeader};
use crate::control::ControlFileKind;
use crate::error::Result;
use log::warn;

pub const TAG: &[u8] = b"M1";

pub const MIN_LEN: usize = 0x0100;

pub const EVENTS_OFFSET: usize = 0x0080;

/// Fixed time base of MCP files
pub const TIME_BASE: u16 = 48;

/// Rhythm patterns + 8 parts + rhythm sequence
pub const TRACK_COUNT: usize = 10;
pub const PATTERN_TRACK: usize = 0;
pub const RHYTHM_TRACK: usize = 9;

/// Channel used by the rhythm sequence when the file leaves it unset
const DEFAULT_RHYTHM_CHANNEL: i8 = 9;

pub mod offset {
    pub const TITLE: usize = 0x0002;
    pub const TEMPO: usize = 0x0020;
    pub const BEAT_N: usize = 0x0021;
    pub const BEAT_D: usize = 0x0022;
    pub const KEY: usize = 0x0023;
    pub const PLAY_BIAS: usize = 0x0024;
    pub const MTD_FILE: usize = 0x0030;
    pub const CHANNELS: usize = 0x0040;
}

/// Parse an MCP file, `Ok(None)` if the tag does not match
pub fn parse(data: &[u8]) -> Result<Option<RawSong>> {
    let reader = ByteReader::new(data);
    if reader.len() < MIN_LEN || !(reader.has_signature(0, TAG) || reader.has_signature(0, &[0, 0])) {
        return Ok(None);
    }

    let mtd_name = super::text::file_name(reader.bytes_at(offset::MTD_FILE, 8)?);
    let control_files = if mtd_name.is_empty() {
        Vec::new()
    } else {
        vec![(ControlFileKind::Mtd, [mtd_name.as_slice(), b".MTD"].concat())]
    };

    let header = HeaderFields {
        dialect: Dialect::Mcp,
        title: reader.bytes_at(offset::TITLE, 30)?.to_vec(),
        memo_lines: Vec::new(),
        time_base: TIME_BASE,
        tempo: reader.u8_at(offset::TEMPO)? as u16,
        beat_n: reader.u8_at(offset::BEAT_N)?,
        beat_d: reader.u8_at(offset::BEAT_D)?,
        key: reader.u8_at(offset::KEY)?,
        play_bias: reader.i8_at(offset::PLAY_BIAS)?,
        max_tracks: TRACK_COUNT,
        old_track_count: false,
        user_exclusives: Vec::new(),
        control_files,
    };

    let mut tracks = Vec::with_capacity(TRACK_COUNT);
    for i in 0..TRACK_COUNT {
        let raw_channel = reader.u8_at(offset::CHANNELS + i)?;
        let midi_channel = match (raw_channel, i) {
            (0, RHYTHM_TRACK) => DEFAULT_RHYTHM_CHANNEL,
            (0, _) => -1,
            (ch, _) => (ch - 1).min(0x1f) as i8,
        };
        let is_rhythm = i == PATTERN_TRACK || i == RHYTHM_TRACK;
        tracks.push(RawTrack {
            header: TrackHeader {
                track_no: i as u8 + 1,
                midi_channel,
                key_shift: if is_rhythm { 0x80 } else { 0x00 },
                ..TrackHeader::default()
            },
            events: Vec::new(),
        });
    }

    // Records are handed to the tracks in order, moving on at each Track End
    let body = reader.bytes_at(EVENTS_OFFSET, reader.len() - EVENTS_OFFSET)?;
    let mut current = 0;
    for event in split_events(body, Dialect::Mcp) {
        tracks[current].events.push(event);
        if event.opcode(Dialect::Mcp) == Opcode::TrackEnd {
            current += 1;
            if current == TRACK_COUNT {
                break;
            }
        }
    }
    if current < TRACK_COUNT {
        warn!("MCP data ended after {} of {} tracks", current, TRACK_COUNT);
    }

    Ok(Some(RawSong { header, tracks }))
}
