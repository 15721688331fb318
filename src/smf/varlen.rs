//! Variable-length quantities

/// Largest value that fits in four 7-bit groups
pub const MAX: u32 = 0x0fff_ffff;

/// Append `value` as a variable-length quantity, clamped to [`MAX`]
pub fn write(buf: &mut Vec<u8>, value: u32) {
    let value = value.min(MAX);
    let mut shift = 21;
    while shift > 0 && value >> shift == 0 {
        shift -= 7;
    }
    while shift > 0 {
        buf.push(((value >> shift) & 0x7f) as u8 | 0x80);
        shift -= 7;
    }
    buf.push((value & 0x7f) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write(&mut buf, value);
        buf
    }

    #[test]
    fn test_group_boundaries() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(0x7f), vec![0x7f]);
        assert_eq!(encode(0x80), vec![0x81, 0x00]);
        assert_eq!(encode(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encode(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encode(0x20_0000), vec![0x81, 0x80, 0x80, 0x00]);
        assert_eq!(encode(MAX), vec![0xff, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn test_clamped() {
        assert_eq!(encode(u32::MAX), encode(MAX));
    }
}
