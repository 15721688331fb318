//! GS control file (GSD) to SysEx

use crate::rcm::reader::ByteReader;
use crate::sysex::{roland_dt1, MODEL_GS};

const TOTAL_SIZE: usize = 0x0a71;

/// Offsets of the voice reserve value of each part
const VOICE_RESERVE: [usize; 16] = [
    0x04f9, 0x00af, 0x0129, 0x01a3, 0x021d, 0x0297, 0x0311, 0x038b, 0x0405, 0x047f, 0x0573,
    0x05ed, 0x0667, 0x06e1, 0x075b, 0x07d5,
];

/// Block number of each part in the dump order (part 10 is block 0)
const PART_BLOCK: [usize; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 10, 11, 12, 13, 14, 15];

const PATCH_SIZE: usize = 0x7a;
const DRUM_SETUP_SIZE: usize = 0x148;

/// Address (middle byte) of the level, panpot, reverb and chorus maps
const DRUM_ADDRESS: [u8; 4] = [0x02, 0x06, 0x08, 0x0a];

/// Convert a GSD dump, `None` if it is not one
pub fn convert(data: &[u8]) -> Option<Vec<Vec<u8>>> {
    let reader = ByteReader::new(data);
    if reader.len() < TOTAL_SIZE
        || !reader.has_signature(0x0000, b"COME ON MUSIC")
        || !reader.has_signature(0x000e, b"GS CONTROL 1.0")
    {
        return None;
    }

    let gs = |address: [u8; 3], bytes: &[u8]| roland_dt1(MODEL_GS, address, bytes);
    let mut sysexs = Vec::new();

    // Master tune
    sysexs.push(gs([0x40, 0x00, 0x00], &data[0x0020..0x0024]));

    // Master volume, key shift, panpot
    for i in 0..3 {
        sysexs.push(gs([0x40, 0x00, 0x04 + i as u8], &data[0x0024 + i..0x0025 + i]));
    }

    // Reverb
    for i in 0..7 {
        sysexs.push(gs([0x40, 0x01, 0x30 + i as u8], &data[0x0027 + i..0x0028 + i]));
    }

    // Chorus
    for i in 0..8 {
        sysexs.push(gs([0x40, 0x01, 0x38 + i as u8], &data[0x002e + i..0x002f + i]));
    }

    let reserve: Vec<u8> = VOICE_RESERVE.iter().map(|&offset| data[offset]).collect();
    sysexs.push(gs([0x40, 0x01, 0x10], &reserve));

    for (i, block) in PART_BLOCK.iter().enumerate() {
        let offset = 0x0036 + i * PATCH_SIZE;
        let addr = 0x90 + 0xe0 * block;
        let nibbles = patch_nibbles(&data[offset..offset + PATCH_SIZE]);
        for (packet, chunk) in nibbles.chunks(128).enumerate() {
            let address = [0x48, (addr >> 7) as u8 + packet as u8, (addr & 0x7f) as u8];
            sysexs.push(gs(address, chunk));
        }
    }

    for i in 0..2 {
        let offset = 0x07d6 + i * DRUM_SETUP_SIZE;
        let setup = &data[offset..offset + DRUM_SETUP_SIZE];

        // level, panpot, reverb, chorus per note, notes 27-108
        let mut params = [[0u8; 128]; 4];
        for (j, &value) in setup.iter().enumerate() {
            params[j % 4][27 + j / 4] = value;
        }

        let map = (i * 0x10) as u8;
        for (param, base) in params.iter().zip(DRUM_ADDRESS) {
            sysexs.push(gs([0x49, base + map, 0x00], &nibblize(&param[..64])));
            sysexs.push(gs([0x49, base + 1 + map, 0x00], &nibblize(&param[64..])));
        }
    }

    Some(sysexs)
}

fn nibblize(values: &[u8]) -> Vec<u8> {
    values.iter().flat_map(|&v| [(v >> 4) & 0x0f, v & 0x0f]).collect()
}

/// Lay out one part's patch parameters as the 224 nibbles of the GS
/// patch parameter block
fn patch_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(224);

    // Tone number (bank LSB, program)
    nibbles.extend(nibblize(&bytes[0x00..0x02]));

    // Rx switches, 4 per nibble
    for group in bytes[0x03..0x13].chunks(4) {
        let nibble = group
            .iter()
            .enumerate()
            .fold(0u8, |acc, (k, &b)| acc | ((b & 0x01) << (3 - k)));
        nibbles.push(nibble);
    }

    // MIDI channel
    nibbles.extend(nibblize(&bytes[0x02..0x03]));

    // Mono/poly, assign mode, rhythm part
    let rhythm = bytes[0x15];
    nibbles.push(((bytes[0x13] & 0x01) << 3) | ((rhythm & 0x03) << 1) | u8::from(rhythm > 0));
    nibbles.push(bytes[0x14] & 0x03);

    // Pitch key shift, pitch offset fine
    nibbles.extend(nibblize(&bytes[0x16..0x17]));
    nibbles.push(bytes[0x17] & 0x0f);
    nibbles.push(bytes[0x18] & 0x0f);

    // Level, panpot, velocity sense offset/depth, key range low/high
    for offset in [0x19, 0x1c, 0x1b, 0x1a, 0x1d, 0x1e] {
        nibbles.extend(nibblize(&bytes[offset..offset + 1]));
    }

    // Chorus/reverb send, tone modify 1-8
    nibbles.extend(nibblize(&bytes[0x21..0x2b]));

    nibbles.extend([0, 0, 0, 0]);

    // Scale tuning C-B
    nibbles.extend(nibblize(&bytes[0x2b..0x37]));

    // CC1/CC2 controller numbers
    nibbles.extend(nibblize(&bytes[0x1f..0x21]));

    // Destination controllers
    for i in 0..6 {
        let index = 0x37 + i * 11;
        nibbles.extend(nibblize(&bytes[index..index + 3]));
        nibbles.extend([0, 0]);
        nibbles.extend(nibblize(&bytes[index + 3..index + 11]));
    }

    debug_assert_eq!(nibbles.len(), 224);
    nibbles
}
