//! Fixed-width text field helpers shared by all dialects

use crate::settings::Trim;

/// Cut a field at its first NUL byte
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(i) => &bytes[..i],
        None => bytes,
    }
}

/// Normalize a file name field: cut at NUL, strip spaces on both ends
pub fn file_name(bytes: &[u8]) -> Vec<u8> {
    field(bytes, Trim::Both).to_vec()
}

/// A text field as it goes into a meta event
pub fn field(bytes: &[u8], trim: Trim) -> &[u8] {
    trim.apply(trim_nul(bytes))
}

/// Whether a byte string is plain printable ASCII
pub fn is_printable_ascii(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| (0x20..=0x7e).contains(b))
}
