//! Exclusive templates (UsrExc, Tr.Excl, RolPara)

use crate::policy::Violation;

/// Template placeholder bytes
pub mod placeholder {
    pub const GATE: u8 = 0x80;
    pub const VELOCITY: u8 = 0x81;
    pub const CHANNEL: u8 = 0x82;
    /// Restart the checksum here, emits nothing
    pub const CHECKSUM_START: u8 = 0x83;
    pub const CHECKSUM: u8 = 0x84;
    pub const END: u8 = 0xf7;
}

/// Build a complete SysEx from a template
///
/// `channel` is `None` when the track has no MIDI channel.
pub fn fill(template: &[u8], channel: Option<u8>, gt: u16, vel: u8) -> Result<Vec<u8>, Violation> {
    let mut sysex = vec![0xf0];
    let mut sum: u32 = 0;
    for &byte in template {
        let value = match byte {
            placeholder::GATE => gt as i32,
            placeholder::VELOCITY => vel as i32,
            placeholder::CHANNEL => channel.map_or(-1, i32::from),
            placeholder::CHECKSUM_START => {
                sum = 0;
                continue;
            }
            placeholder::CHECKSUM => ((0x80 - (sum & 0x7f)) & 0x7f) as i32,
            placeholder::END => break,
            _ => byte as i32,
        };
        if !(0..0x80).contains(&value) {
            return Err(Violation::OutOfRange(vec![value]));
        }
        sysex.push(value as u8);
        sum += value as u32;
    }
    sysex.push(0xf7);
    Ok(sysex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysex::GS_RESET;

    #[test]
    fn test_roland_template() {
        // GS reset written as a user exclusive
        let template = [0x41, 0x10, 0x42, 0x12, 0x83, 0x40, 0x00, 0x7f, 0x00, 0x84, 0xf7, 0x00];
        assert_eq!(fill(&template, Some(0), 0, 0).unwrap(), GS_RESET);
    }

    #[test]
    fn test_placeholders() {
        let template = [0x43, 0x10, 0x82, 0x80, 0x81];
        assert_eq!(
            fill(&template, Some(3), 0x12, 0x34).unwrap(),
            vec![0xf0, 0x43, 0x10, 0x03, 0x12, 0x34, 0xf7]
        );
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            fill(&[0x41, 0x80], None, 0x100, 0),
            Err(Violation::OutOfRange(vec![0x100]))
        );
        assert_eq!(fill(&[0x82], None, 0, 0), Err(Violation::OutOfRange(vec![-1])));
        assert!(fill(&[0x41, 0xa0], Some(0), 0, 0).is_err());
    }
}
