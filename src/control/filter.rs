//! Redundant setup message detection

use crate::sysex::{parse_dt1, MODEL_GS};

/// GS power-on values of the single parameters a GSD dump always writes
const GS_DEFAULTS: &[([u8; 3], &[u8])] = &[
    // Master tune, volume, key shift, pan
    ([0x40, 0x00, 0x00], &[0x00, 0x04, 0x00, 0x00]),
    ([0x40, 0x00, 0x04], &[0x7f]),
    ([0x40, 0x00, 0x05], &[0x40]),
    ([0x40, 0x00, 0x06], &[0x40]),
    // Reverb macro, character, pre-LPF, level, time, delay feedback
    ([0x40, 0x01, 0x30], &[0x04]),
    ([0x40, 0x01, 0x31], &[0x04]),
    ([0x40, 0x01, 0x32], &[0x00]),
    ([0x40, 0x01, 0x33], &[0x40]),
    ([0x40, 0x01, 0x34], &[0x40]),
    ([0x40, 0x01, 0x35], &[0x00]),
    // Chorus macro, pre-LPF, level, feedback, delay, rate, depth, send to reverb
    ([0x40, 0x01, 0x38], &[0x02]),
    ([0x40, 0x01, 0x39], &[0x00]),
    ([0x40, 0x01, 0x3a], &[0x40]),
    ([0x40, 0x01, 0x3b], &[0x08]),
    ([0x40, 0x01, 0x3c], &[0x50]),
    ([0x40, 0x01, 0x3d], &[0x03]),
    ([0x40, 0x01, 0x3e], &[0x13]),
    ([0x40, 0x01, 0x3f], &[0x00]),
];

/// Whether a setup message only restates what a GS reset already did
pub fn is_redundant(sysex: &[u8]) -> bool {
    let Some(dt1) = parse_dt1(sysex) else {
        return false;
    };
    dt1.model == MODEL_GS
        && GS_DEFAULTS
            .iter()
            .any(|(address, value)| dt1.address == *address && dt1.data == *value)
}
