//! G36 dialect (Recomposer 3.0, RCP3)

use super::reader::ByteReader;
use super::text::file_name;
use super::{read_tracks, Dialect, HeaderFields, RawSong, TrackLayout, UserExclusive};
use crate::control::ControlFileKind;
use crate::error::Result;

pub const SIGNATURE: &[u8] = b"COME ON MUSIC RECOMPOSER RCP3.0";

pub const TRACK_HEADER_LEN: usize = 46;

pub const TRACKS_OFFSET: usize = 0x0c98;

pub mod offset {
    pub const TITLE: usize = 0x0020;
    pub const MEMO: usize = 0x00a0;
    pub const TRACK_COUNT: usize = 0x0208;
    pub const TIME_BASE: usize = 0x020a;
    pub const TEMPO: usize = 0x020c;
    pub const BEAT_N: usize = 0x020e;
    pub const BEAT_D: usize = 0x020f;
    pub const KEY: usize = 0x0210;
    pub const PLAY_BIAS: usize = 0x0211;
    pub const GSD_FILE: usize = 0x0298;
    pub const GSD2_FILE: usize = 0x02a8;
    pub const CM6_FILE: usize = 0x02b8;
    pub const USER_EXCLUSIVE: usize = 0x0b18;
}

const TRACK_LAYOUT: TrackLayout = TrackLayout {
    dialect: Dialect::G36,
    header_len: TRACK_HEADER_LEN,
    size_width: 4,
    track_no: 4,
    midi_channel: 6,
    key_shift: 7,
    st_shift: 8,
    mode: 9,
    memo: 10,
};

/// Parse a G36 file, `Ok(None)` if the signature does not match
pub fn parse(data: &[u8]) -> Result<Option<RawSong>> {
    let reader = ByteReader::new(data);
    if reader.len() < TRACKS_OFFSET || !reader.has_signature(0, SIGNATURE) {
        return Ok(None);
    }

    let memo_lines = (0..12)
        .map(|i| reader.bytes_at(offset::MEMO + 30 * i, 30).map(<[u8]>::to_vec))
        .collect::<Result<Vec<_>>>()?;

    let user_exclusives = (0..8)
        .map(|i| {
            let base = offset::USER_EXCLUSIVE + 48 * i;
            Ok(UserExclusive {
                memo: reader.bytes_at(base, 23)?.to_vec(),
                bytes: reader.bytes_at(base + 23, 25)?.to_vec(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let header = HeaderFields {
        dialect: Dialect::G36,
        title: reader.bytes_at(offset::TITLE, 128)?.to_vec(),
        memo_lines,
        time_base: reader.u16_le_at(offset::TIME_BASE)?,
        tempo: reader.u16_le_at(offset::TEMPO)?,
        beat_n: reader.u8_at(offset::BEAT_N)?,
        beat_d: reader.u8_at(offset::BEAT_D)?,
        key: reader.u8_at(offset::KEY)?,
        play_bias: reader.i8_at(offset::PLAY_BIAS)?,
        max_tracks: reader.u16_le_at(offset::TRACK_COUNT)? as usize,
        old_track_count: false,
        user_exclusives,
        control_files: [
            (ControlFileKind::Gsd, file_name(reader.bytes_at(offset::GSD_FILE, 16)?)),
            (ControlFileKind::Gsd2, file_name(reader.bytes_at(offset::GSD2_FILE, 16)?)),
            (ControlFileKind::Cm6, file_name(reader.bytes_at(offset::CM6_FILE, 16)?)),
        ]
        .into_iter()
        .filter(|(_, name)| !name.is_empty())
        .collect(),
    };

    let tracks = read_tracks(&reader, TRACKS_OFFSET, header.max_tracks, &TRACK_LAYOUT)?;
    Ok(Some(RawSong { header, tracks }))
}
