//! SMF chunk writer

use super::varlen;
use crate::converter::sequence::TrackMap;

pub const HEADER_CHUNK: &[u8; 4] = b"MThd";
pub const TRACK_CHUNK: &[u8; 4] = b"MTrk";

/// SMF writer
///
/// Channel messages use running status. A SysEx is re-framed with its
/// length, a meta event is written as built. Both cancel running status.
#[derive(Debug, Default)]
pub struct SmfWriter {
    buf: Vec<u8>,
}

impl SmfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the header chunk
    pub fn write_header(&mut self, format: u16, tracks: u16, division: u16) {
        self.buf.extend_from_slice(HEADER_CHUNK);
        self.buf.extend_from_slice(&6u32.to_be_bytes());
        self.buf.extend_from_slice(&format.to_be_bytes());
        self.buf.extend_from_slice(&tracks.to_be_bytes());
        self.buf.extend_from_slice(&division.to_be_bytes());
    }

    /// Write one track chunk
    pub fn write_track(&mut self, track: &TrackMap) {
        self.buf.extend_from_slice(TRACK_CHUNK);
        let length_pos = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        let start = self.buf.len();

        let mut prev_time = 0;
        let mut running_status = None;
        for (time, message) in track.iter() {
            let Some(&status) = message.first() else {
                continue;
            };
            varlen::write(&mut self.buf, time - prev_time);
            prev_time = time;

            match status {
                0xf0 => {
                    self.buf.push(0xf0);
                    varlen::write(&mut self.buf, (message.len() - 1) as u32);
                    self.buf.extend_from_slice(&message[1..]);
                    running_status = None;
                }
                0xf1..=0xff => {
                    self.buf.extend_from_slice(message);
                    running_status = None;
                }
                _ if running_status == Some(status) => {
                    self.buf.extend_from_slice(&message[1..]);
                }
                _ => {
                    self.buf.extend_from_slice(message);
                    running_status = Some(status);
                }
            }
        }

        let length = (self.buf.len() - start) as u32;
        self.buf[length_pos..length_pos + 4].copy_from_slice(&length.to_be_bytes());
    }

    /// Take the finished file
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_bytes(track: &TrackMap) -> Vec<u8> {
        let mut writer = SmfWriter::new();
        writer.write_track(track);
        let bytes = writer.finish();
        assert_eq!(&bytes[..4], TRACK_CHUNK);
        let length = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(length, bytes.len() - 8);
        bytes[8..].to_vec()
    }

    #[test]
    fn test_header_chunk() {
        let mut writer = SmfWriter::new();
        writer.write_header(1, 2, 48);
        assert_eq!(
            writer.finish(),
            vec![0x4d, 0x54, 0x68, 0x64, 0, 0, 0, 6, 0, 1, 0, 2, 0, 0x30]
        );
    }

    #[test]
    fn test_running_status() {
        let mut track = TrackMap::new();
        track.insert(0, vec![0x90, 0x3c, 0x64]);
        track.insert(0, vec![0x90, 0x40, 0x64]);
        track.insert(48, vec![0x90, 0x3c, 0x00]);
        track.insert(48, vec![0x80, 0x40, 0x40]);
        track.insert(48, vec![0xff, 0x2f, 0x00]);
        assert_eq!(
            track_bytes(&track),
            vec![
                0x00, 0x90, 0x3c, 0x64, //
                0x00, 0x40, 0x64, //
                0x30, 0x3c, 0x00, //
                0x00, 0x80, 0x40, 0x40, //
                0x00, 0xff, 0x2f, 0x00,
            ]
        );
    }

    #[test]
    fn test_sysex_and_meta_cancel_running_status() {
        let mut track = TrackMap::new();
        track.insert(0, vec![0xb0, 0x07, 0x64]);
        track.insert(0, vec![0xf0, 0x41, 0x10, 0x42, 0xf7]);
        track.insert(0, vec![0xb0, 0x0a, 0x40]);
        track.insert(0, vec![0xff, 0x01, 0x01, b'a']);
        track.insert(200, vec![0xb0, 0x0b, 0x7f]);
        assert_eq!(
            track_bytes(&track),
            vec![
                0x00, 0xb0, 0x07, 0x64, //
                0x00, 0xf0, 0x04, 0x41, 0x10, 0x42, 0xf7, //
                0x00, 0xb0, 0x0a, 0x40, //
                0x00, 0xff, 0x01, 0x01, b'a', //
                0x81, 0x48, 0xb0, 0x0b, 0x7f,
            ]
        );
    }
}
