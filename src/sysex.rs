//! System Exclusive helpers shared by the converter, the control file
//! mappers and the setup scheduler

pub const ROLAND_ID: u8 = 0x41;
pub const YAMAHA_ID: u8 = 0x43;

/// Roland DT1 (data set 1) command id
pub const DT1: u8 = 0x12;

/// Model id of the MT-32/CM-64 family (LA sound)
pub const MODEL_LA: u8 = 0x16;
/// Model id of GS devices
pub const MODEL_GS: u8 = 0x42;

/// GS Reset
pub const GS_RESET: [u8; 11] = [0xf0, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7f, 0x00, 0x41, 0xf7];

/// MT-32 All Parameters Reset
pub const LA_RESET: [u8; 11] = [0xf0, 0x41, 0x10, 0x16, 0x12, 0x7f, 0x00, 0x00, 0x00, 0x01, 0xf7];

/// Roland checksum over an address + data span
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u32, |acc, &b| acc + b as u32);
    (0x80 - (sum & 0x7f) as u8) & 0x7f
}

/// Build a complete Roland DT1 message
pub fn roland_dt1(model: u8, address: [u8; 3], data: &[u8]) -> Vec<u8> {
    let mut sysex = Vec::with_capacity(data.len() + 10);
    sysex.extend_from_slice(&[0xf0, ROLAND_ID, 0x10, model, DT1]);
    sysex.extend_from_slice(&address);
    sysex.extend_from_slice(data);
    sysex.push(checksum(&sysex[5..]));
    sysex.push(0xf7);
    sysex
}

/// A decoded Roland DT1 message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dt1<'a> {
    pub device: u8,
    pub model: u8,
    pub address: [u8; 3],
    pub data: &'a [u8],
}

/// Decode a Roland DT1 message, `None` for anything else
pub fn parse_dt1(sysex: &[u8]) -> Option<Dt1<'_>> {
    if sysex.len() < 11 || sysex[0] != 0xf0 || sysex[1] != ROLAND_ID || sysex[4] != DT1 {
        return None;
    }
    if sysex[sysex.len() - 1] != 0xf7 {
        return None;
    }
    Some(Dt1 {
        device: sysex[2],
        model: sysex[3],
        address: [sysex[5], sysex[6], sysex[7]],
        data: &sysex[8..sysex.len() - 2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // GS Reset: 40 00 7F 00 -> 41
        assert_eq!(checksum(&[0x40, 0x00, 0x7f, 0x00]), 0x41);
        assert_eq!(checksum(&[0x7f, 0x00, 0x00, 0x00]), 0x01);
        assert_eq!(checksum(&[0x00]), 0x00);
    }

    #[test]
    fn test_resets_are_well_formed() {
        assert_eq!(roland_dt1(MODEL_GS, [0x40, 0x00, 0x7f], &[0x00]), GS_RESET);
        assert_eq!(roland_dt1(MODEL_LA, [0x7f, 0x00, 0x00], &[0x00]), LA_RESET);
    }

    #[test]
    fn test_parse_dt1() {
        let dt1 = parse_dt1(&GS_RESET).unwrap();
        assert_eq!(dt1.model, MODEL_GS);
        assert_eq!(dt1.address, [0x40, 0x00, 0x7f]);
        assert_eq!(dt1.data, &[0x00]);
        assert!(parse_dt1(&[0xf0, 0x43, 0x10, 0x4c, 0x00, 0x00, 0x7e, 0x00, 0xf7]).is_none());
    }
}
