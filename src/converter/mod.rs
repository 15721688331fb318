//! Song to SMF conversion
//!
//! The pipeline is parse, flatten each track, interpret the flattened
//! events into a [`Sequence`], then serialize. Control file setup is
//! prepended to the conductor track as a measure of SysEx.

pub mod extract;
pub mod meta;
pub mod rhythm;
pub mod sequence;
pub mod setup;
pub mod template;
pub mod track;

use crate::control::{self, filter, ControlData, ControlFileReader, FsControlFileReader};
use crate::error::{Error, Result};
use crate::rcm::text::field;
use crate::rcm::{self, mcp, HeaderFields, RawSong, TrackHeader};
use crate::settings::{Settings, Trim};
use crate::smf;
use crate::sysex::{GS_RESET, LA_RESET};
use extract::Event;
use log::{debug, info};
use sequence::{Sequence, TrackMap};
use std::collections::HashSet;
use std::path::Path;
use track::{SongContext, TrackConverter};

/// Recomposer to SMF converter
#[derive(Default)]
pub struct Converter {
    settings: Settings,
    reader: Option<Box<dyn ControlFileReader>>,
}

impl Converter {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            reader: None,
        }
    }

    /// Use `reader` to fetch control files
    pub fn with_reader(mut self, reader: impl ControlFileReader + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Convert song data to SMF bytes
    pub fn convert(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.convert_with(data, self.reader.as_deref())
    }

    /// Convert a song file
    ///
    /// Without an explicit reader, control files are looked up next to the
    /// input file.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<()> {
        let data = std::fs::read(input).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open '{}': {}", input.display(), e),
            ))
        })?;

        let fs_reader;
        let reader: &dyn ControlFileReader = match &self.reader {
            Some(reader) => reader.as_ref(),
            None => {
                let base = input.parent().unwrap_or_else(|| Path::new("."));
                fs_reader = FsControlFileReader::new(base);
                &fs_reader
            }
        };

        let smf = self.convert_with(&data, Some(reader))?;
        std::fs::write(output, &smf)?;
        info!("Wrote {} bytes to '{}'", smf.len(), output.display());
        Ok(())
    }

    fn convert_with(&self, data: &[u8], reader: Option<&dyn ControlFileReader>) -> Result<Vec<u8>> {
        let song = rcm::parse(data)?;
        let control = control::load(&song.header, reader, &self.settings)?;
        let sequence = build_sequence(&song, &control, &self.settings)?;
        Ok(smf::serialize(&sequence))
    }
}

/// Interpret a parsed song
pub fn build_sequence(song: &RawSong, control: &ControlData, settings: &Settings) -> Result<Sequence> {
    let header = &song.header;
    if header.tempo == 0 {
        return Err(Error::InvalidTempo("song tempo is 0".into()));
    }
    if header.time_base == 0 {
        return Err(Error::InvalidTempo("time base is 0".into()));
    }

    let tracks = extract_tracks(song, settings)?;

    let mut conductor = TrackMap::new();
    write_song_info(header, settings, &mut conductor);
    let base_time = write_setup_measure(header, control, settings, &mut conductor);
    conductor.insert(base_time, meta::tempo(60_000_000 / header.tempo as u64));

    let ports: HashSet<u8> = tracks.iter().map(|(h, _)| h.port()).collect();
    let context = SongContext {
        header,
        settings,
        patch_memory: control.patch_memory.as_deref(),
    };

    let mut outputs = Vec::with_capacity(tracks.len());
    let mut max_duration = 0;
    for (track_header, events) in &tracks {
        let start = base_time + track_header.start_offset(header, settings.st_plus) as i64;
        let mut converter = TrackConverter::new(&context, track_header, start);

        let name = field(&track_header.memo, settings.trim_track_name);
        if !name.is_empty() {
            converter.track_mut().insert(0, meta::text(meta::SEQUENCE_NAME, name));
        }
        if ports.len() > 1 {
            converter.track_mut().insert(0, meta::port(track_header.port()));
        }

        let (track, end) = converter.run(events, &mut conductor)?;
        max_duration = max_duration.max(end);
        outputs.push(track);
    }

    let end = conductor.last_time().map_or(0, i64::from).max(max_duration);
    conductor.insert(end, meta::end_of_track());

    let mut all = Vec::with_capacity(outputs.len() + 1);
    all.push(conductor);
    all.extend(outputs);
    debug!("Converted {} tracks", all.len() - 1);

    Ok(Sequence {
        time_base: header.time_base,
        tracks: all,
    })
}

/// Flatten every playable track
///
/// Muted tracks and tracks holding nothing but their end marker are left
/// out. MCP rhythm patterns are resolved here and the pattern track dropped.
fn extract_tracks<'s>(song: &'s RawSong, settings: &Settings) -> Result<Vec<(&'s TrackHeader, Vec<Event>)>> {
    let header = &song.header;
    let mut tracks = song
        .tracks
        .iter()
        .map(|raw| {
            let events = if raw.header.is_muted() {
                Vec::new()
            } else {
                extract::extract(&raw.events, header.dialect, header.time_base, settings)?
            };
            Ok((&raw.header, events))
        })
        .collect::<Result<Vec<_>>>()?;

    if header.is_mcp() && tracks.len() > mcp::RHYTHM_TRACK {
        let patterns = rhythm::split_patterns(&tracks[mcp::PATTERN_TRACK].1);
        let expanded = rhythm::expand(&tracks[mcp::RHYTHM_TRACK].1, &patterns, settings)?;
        tracks[mcp::RHYTHM_TRACK].1 = expanded;
        tracks.remove(mcp::PATTERN_TRACK);
    }

    tracks.retain(|(track, events)| {
        let keep = !track.is_muted() && events.len() > 1;
        if !keep {
            debug!("Track {} is muted or empty. Skipped.", track.track_no);
        }
        keep
    });
    Ok(tracks)
}

/// Title, memo, time and key signature
fn write_song_info(header: &HeaderFields, settings: &Settings, conductor: &mut TrackMap) {
    let title = field(&header.title, Trim::Both);
    if !title.is_empty() {
        conductor.insert(0, meta::text(meta::SEQUENCE_NAME, title));
    }

    let has_memo = header
        .memo_lines
        .iter()
        .any(|line| !field(line, Trim::Both).is_empty());
    if settings.meta_text_memo && has_memo {
        for line in &header.memo_lines {
            conductor.insert(0, meta::text(meta::TEXT, field(line, settings.trim_text_memo)));
        }
    }

    conductor.insert(0, meta::time_signature(header.beat_n, header.beat_d));
    conductor.insert(0, meta::key_signature(header.key));
}

/// Setup messages in sending order: GS family first, then LA
fn setup_messages(control: &ControlData, settings: &Settings) -> Vec<Vec<u8>> {
    let optimize = settings.reset_before_ctrl && settings.optimize_ctrl;
    let mut messages = Vec::new();
    for (family, reset) in [(&control.gs, GS_RESET), (&control.la, LA_RESET)] {
        if family.is_empty() {
            continue;
        }
        if settings.reset_before_ctrl {
            messages.push(reset.to_vec());
        }
        messages.extend(
            family
                .iter()
                .filter(|sysex| !(optimize && filter::is_redundant(sysex)))
                .cloned(),
        );
    }
    messages
}

/// Lay out the setup measure and return where the song proper starts
fn write_setup_measure(
    header: &HeaderFields,
    control: &ControlData,
    settings: &Settings,
    conductor: &mut TrackMap,
) -> i64 {
    let messages = setup_messages(control, settings);
    if messages.is_empty() {
        return 0;
    }

    let measure = setup::setup_measure_len(header.beat_n, header.beat_d, header.time_base);
    let mut total = measure;
    while (total as usize) < messages.len() {
        total += measure;
    }

    let timings = setup::schedule(&messages, total, header.time_base);
    let slowest = timings.iter().map(|t| t.usec_per_beat).max().unwrap_or(0);
    if slowest > 60_000_000 / header.tempo as u64 {
        conductor.insert(0, meta::tempo(slowest));
    }

    let mut time = 0;
    for timing in &timings {
        conductor.insert(time, timing.sysex.to_vec());
        time += timing.ticks as i64;
    }

    debug!(
        "Setup measure: {} messages in {} ticks, {} usec/beat",
        messages.len(),
        total,
        slowest
    );
    total as i64
}
