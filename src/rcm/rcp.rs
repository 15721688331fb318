//! RCP dialect (Recomposer 2.x for PC-98)

use super::reader::ByteReader;
use super::text::file_name;
use super::{read_tracks, Dialect, HeaderFields, RawSong, TrackLayout, UserExclusive};
use crate::control::ControlFileKind;
use crate::error::Result;

pub const SIGNATURE: &[u8] = b"RCM-PC98V2.0(C)COME ON MUSIC";

pub const TRACK_HEADER_LEN: usize = 44;

/// Offset of the first track, also the minimum file length
pub const TRACKS_OFFSET: usize = 0x0586;

/// Header offsets
pub mod offset {
    pub const TITLE: usize = 0x0020;
    pub const MEMO: usize = 0x0060;
    pub const TIME_BASE_LOW: usize = 0x01c0;
    pub const TEMPO: usize = 0x01c1;
    pub const BEAT_N: usize = 0x01c2;
    pub const BEAT_D: usize = 0x01c3;
    pub const KEY: usize = 0x01c4;
    pub const PLAY_BIAS: usize = 0x01c5;
    pub const CM6_FILE: usize = 0x01c6;
    pub const GSD_FILE: usize = 0x01d6;
    pub const TRACK_COUNT: usize = 0x01e6;
    pub const TIME_BASE_HIGH: usize = 0x01e7;
    pub const USER_EXCLUSIVE: usize = 0x0406;
}

const TRACK_LAYOUT: TrackLayout = TrackLayout {
    dialect: Dialect::Rcp,
    header_len: TRACK_HEADER_LEN,
    size_width: 2,
    track_no: 2,
    midi_channel: 4,
    key_shift: 5,
    st_shift: 6,
    mode: 7,
    memo: 8,
};

/// Parse an RCP file, `Ok(None)` if the signature does not match
pub fn parse(data: &[u8]) -> Result<Option<RawSong>> {
    let reader = ByteReader::new(data);
    if reader.len() < TRACKS_OFFSET || !reader.has_signature(0, SIGNATURE) {
        return Ok(None);
    }

    let memo_lines = (0..12)
        .map(|i| reader.bytes_at(offset::MEMO + 28 * i, 28).map(<[u8]>::to_vec))
        .collect::<Result<Vec<_>>>()?;

    let user_exclusives = (0..8)
        .map(|i| {
            let base = offset::USER_EXCLUSIVE + 48 * i;
            Ok(UserExclusive {
                memo: reader.bytes_at(base, 24)?.to_vec(),
                bytes: reader.bytes_at(base + 24, 24)?.to_vec(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let track_count = reader.u8_at(offset::TRACK_COUNT)?;
    let time_base = ((reader.u8_at(offset::TIME_BASE_HIGH)? as u16) << 8)
        | reader.u8_at(offset::TIME_BASE_LOW)? as u16;

    let header = HeaderFields {
        dialect: Dialect::Rcp,
        title: reader.bytes_at(offset::TITLE, 64)?.to_vec(),
        memo_lines,
        time_base,
        tempo: reader.u8_at(offset::TEMPO)? as u16,
        beat_n: reader.u8_at(offset::BEAT_N)?,
        beat_d: reader.u8_at(offset::BEAT_D)?,
        key: reader.u8_at(offset::KEY)?,
        play_bias: reader.i8_at(offset::PLAY_BIAS)?,
        max_tracks: if track_count == 0 { 18 } else { track_count as usize },
        old_track_count: track_count == 0,
        user_exclusives,
        control_files: [
            (ControlFileKind::Cm6, file_name(reader.bytes_at(offset::CM6_FILE, 12)?)),
            (ControlFileKind::Gsd, file_name(reader.bytes_at(offset::GSD_FILE, 12)?)),
        ]
        .into_iter()
        .filter(|(_, name)| !name.is_empty())
        .collect(),
    };

    let tracks = read_tracks(&reader, TRACKS_OFFSET, header.max_tracks, &TRACK_LAYOUT)?;
    Ok(Some(RawSong { header, tracks }))
}
