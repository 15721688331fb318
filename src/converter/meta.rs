//! Meta event builders

use crate::smf::varlen;

pub const TEXT: u8 = 0x01;
pub const SEQUENCE_NAME: u8 = 0x03;
pub const CUE_POINT: u8 = 0x07;

const MAX_USEC_PER_BEAT: u64 = 0x00ff_ffff;

/// Text-like meta event (`FF kind len text`)
pub fn text(kind: u8, bytes: &[u8]) -> Vec<u8> {
    let mut event = vec![0xff, kind];
    varlen::write(&mut event, bytes.len() as u32);
    event.extend_from_slice(bytes);
    event
}

/// Set Tempo, clamped to the 24-bit field
pub fn tempo(usec_per_beat: u64) -> Vec<u8> {
    let usec = usec_per_beat.min(MAX_USEC_PER_BEAT) as u32;
    let [_, a, b, c] = usec.to_be_bytes();
    vec![0xff, 0x51, 0x03, a, b, c]
}

/// Key Signature from a Recomposer key byte
///
/// Low nibble 0-7 counts sharps, 8-15 flats (`8 - n`). Bit 4 selects minor.
pub fn key_signature(key: u8) -> Vec<u8> {
    let n = (key & 0x0f) as i8;
    let sf = if n < 8 { n } else { 8 - n };
    let minor = u8::from(key & 0x10 != 0);
    vec![0xff, 0x59, 0x02, sf as u8, minor]
}

/// Time Signature, falling back to 4/4 when the beat can't be expressed
pub fn time_signature(numerator: u8, denominator: u8) -> Vec<u8> {
    let (nn, dd) = if denominator.is_power_of_two() && numerator > 0 {
        (numerator, denominator)
    } else {
        (4, 4)
    };
    vec![0xff, 0x58, 0x04, nn, dd.trailing_zeros() as u8, 0x18, 0x08]
}

/// MIDI Port (FF 21), not part of the SMF standard but widely understood
pub fn port(port: u8) -> Vec<u8> {
    vec![0xff, 0x21, 0x01, port]
}

pub fn end_of_track() -> Vec<u8> {
    vec![0xff, 0x2f, 0x00]
}
