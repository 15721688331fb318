//! Standard MIDI File output

pub mod varlen;
pub mod writer;

pub use writer::SmfWriter;

use crate::converter::sequence::Sequence;

/// Serialize a sequence as a format 1 SMF
pub fn serialize(sequence: &Sequence) -> Vec<u8> {
    let mut writer = SmfWriter::new();
    writer.write_header(1, sequence.tracks.len() as u16, sequence.time_base);
    for track in &sequence.tracks {
        writer.write_track(track);
    }
    writer.finish()
}
