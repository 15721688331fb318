//! Integration tests for song conversion
//!
//! Songs are assembled byte by byte, converted, and the output is checked
//! both as raw bytes and through the midly SMF parser.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use rcm2smf::control::FsControlFileReader;
use rcm2smf::rcm::{g36, mcp, rcp};
use rcm2smf::sysex::GS_RESET;
use rcm2smf::{Converter, Error, Settings};
use tempfile::tempdir;

fn init_logger() {
    env_logger::try_init().unwrap_or(());
}

/// Minimal RCP file: one entry per track (channel, records)
fn rcp_song(time_base: u16, tempo: u8, tracks: &[(i8, Vec<[u8; 4]>)]) -> Vec<u8> {
    let mut data = vec![0x20u8; rcp::TRACKS_OFFSET];
    data[..rcp::SIGNATURE.len()].copy_from_slice(rcp::SIGNATURE);
    data[rcp::offset::TIME_BASE_LOW] = (time_base & 0xff) as u8;
    data[rcp::offset::TIME_BASE_HIGH] = (time_base >> 8) as u8;
    data[rcp::offset::TEMPO] = tempo;
    data[rcp::offset::BEAT_N] = 4;
    data[rcp::offset::BEAT_D] = 4;
    data[rcp::offset::KEY] = 0;
    data[rcp::offset::PLAY_BIAS] = 0;
    data[rcp::offset::TRACK_COUNT] = tracks.len() as u8;
    for (channel, records) in tracks {
        let size = rcp::TRACK_HEADER_LEN + records.len() * 4;
        let mut header = vec![0x20u8; rcp::TRACK_HEADER_LEN];
        header[0..2].copy_from_slice(&(size as u16).to_le_bytes());
        header[2] = 1;
        header[3] = 0;
        header[4] = *channel as u8;
        header[5..8].copy_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&header);
        for record in records {
            data.extend_from_slice(record);
        }
    }
    data
}

fn g36_song(time_base: u16, tempo: u16, tracks: &[(i8, Vec<[u8; 6]>)]) -> Vec<u8> {
    let mut data = vec![0u8; g36::TRACKS_OFFSET];
    data[..g36::SIGNATURE.len()].copy_from_slice(g36::SIGNATURE);
    data[g36::offset::TRACK_COUNT..g36::offset::TRACK_COUNT + 2]
        .copy_from_slice(&(tracks.len() as u16).to_le_bytes());
    data[g36::offset::TIME_BASE..g36::offset::TIME_BASE + 2].copy_from_slice(&time_base.to_le_bytes());
    data[g36::offset::TEMPO..g36::offset::TEMPO + 2].copy_from_slice(&tempo.to_le_bytes());
    data[g36::offset::BEAT_N] = 4;
    data[g36::offset::BEAT_D] = 4;
    for (channel, records) in tracks {
        let size = g36::TRACK_HEADER_LEN + records.len() * 6;
        let mut header = vec![0u8; g36::TRACK_HEADER_LEN];
        header[0..4].copy_from_slice(&(size as u32).to_le_bytes());
        header[4] = 1;
        header[6] = *channel as u8;
        data.extend_from_slice(&header);
        for record in records {
            data.extend_from_slice(record);
        }
    }
    data
}

fn mcp_song(tempo: u8, channels: [u8; mcp::TRACK_COUNT], tracks: &[Vec<[u8; 4]>]) -> Vec<u8> {
    let mut data = vec![0u8; mcp::EVENTS_OFFSET];
    data[..2].copy_from_slice(mcp::TAG);
    data[mcp::offset::TEMPO] = tempo;
    data[mcp::offset::BEAT_N] = 4;
    data[mcp::offset::BEAT_D] = 4;
    data[mcp::offset::CHANNELS..mcp::offset::CHANNELS + mcp::TRACK_COUNT].copy_from_slice(&channels);
    for i in 0..mcp::TRACK_COUNT {
        for record in tracks.get(i).into_iter().flatten() {
            data.extend_from_slice(record);
        }
        data.extend_from_slice(&[0xfe, 0, 0, 0]);
    }
    data.resize(data.len().max(mcp::MIN_LEN), 0);
    data
}

/// GSD dump holding GS defaults for the system parameters
fn gsd_dump() -> Vec<u8> {
    let mut data = vec![0u8; 0x0a71];
    data[0x00..0x0d].copy_from_slice(b"COME ON MUSIC");
    data[0x0e..0x1c].copy_from_slice(b"GS CONTROL 1.0");
    data[0x0020..0x0024].copy_from_slice(&[0x00, 0x04, 0x00, 0x00]);
    data[0x0024] = 0x7f;
    data[0x0025] = 0x40;
    data[0x0026] = 0x40;
    data
}

const TRACK_END: [u8; 4] = [0xfe, 0, 0, 0];

fn convert(data: &[u8]) -> Vec<u8> {
    init_logger();
    Converter::new(Settings::default())
        .convert(data)
        .expect("Conversion failed")
}

/// Events of a track with absolute times
fn absolute<'a>(track: &[TrackEvent<'a>]) -> Vec<(u32, TrackEventKind<'a>)> {
    let mut time = 0;
    track
        .iter()
        .map(|event| {
            time += event.delta.as_int();
            (time, event.kind)
        })
        .collect()
}

/// `(time, channel, key)` of every sounding Note-On
fn note_ons(track: &[TrackEvent]) -> Vec<(u32, u8, u8)> {
    absolute(track)
        .into_iter()
        .filter_map(|(time, kind)| match kind {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            } if vel.as_int() > 0 => Some((time, channel.as_int(), key.as_int())),
            _ => None,
        })
        .collect()
}

fn tempos(track: &[TrackEvent]) -> Vec<(u32, u32)> {
    absolute(track)
        .into_iter()
        .filter_map(|(time, kind)| match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(usec)) => Some((time, usec.as_int())),
            _ => None,
        })
        .collect()
}

// =============================================================================
// RCP
// =============================================================================

#[test]
fn test_rcp_single_note_bytes() {
    let data = rcp_song(48, 120, &[(0, vec![[0x3c, 48, 48, 100], TRACK_END])]);
    let smf = convert(&data);

    let header = [
        0x4d, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x02, 0x00, 0x30,
    ];
    assert_eq!(&smf[..14], &header);

    let conductor = [
        0x4d, 0x54, 0x72, 0x6b, 0x00, 0x00, 0x00, 0x19, //
        0x00, 0xff, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, //
        0x00, 0xff, 0x59, 0x02, 0x00, 0x00, //
        0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20, //
        0x30, 0xff, 0x2f, 0x00,
    ];
    assert_eq!(&smf[14..14 + conductor.len()], &conductor);

    // Note-off reuses the running status
    let track = [
        0x4d, 0x54, 0x72, 0x6b, 0x00, 0x00, 0x00, 0x0b, //
        0x00, 0x90, 0x3c, 0x64, //
        0x30, 0x3c, 0x00, //
        0x00, 0xff, 0x2f, 0x00,
    ];
    assert_eq!(&smf[14 + conductor.len()..], &track);
}

#[test]
fn test_rcp_parses_as_smf() {
    let data = rcp_song(
        96,
        150,
        &[
            (0, vec![[0x3c, 96, 90, 100], [0x40, 96, 90, 100], TRACK_END]),
            (9, vec![[0x24, 48, 10, 127], [0x26, 48, 10, 127], TRACK_END]),
        ],
    );
    let bytes = convert(&data);
    let smf = Smf::parse(&bytes).expect("Output is not a valid SMF");

    assert_eq!(smf.header.timing, Timing::Metrical(96.into()));
    assert_eq!(smf.tracks.len(), 3);
    assert_eq!(tempos(&smf.tracks[0]), vec![(0, 400_000)]);
    assert_eq!(note_ons(&smf.tracks[1]), vec![(0, 0, 0x3c), (96, 0, 0x40)]);
    assert_eq!(note_ons(&smf.tracks[2]), vec![(0, 9, 0x24), (48, 9, 0x26)]);

    for track in &smf.tracks {
        assert!(matches!(
            track.last().map(|e| e.kind),
            Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
        ));
    }
}

#[test]
fn test_rcp_loop() {
    let data = rcp_song(
        48,
        120,
        &[(
            0,
            vec![
                [0xf9, 0, 0, 0],
                [0x3c, 24, 20, 100],
                [0x3e, 24, 20, 100],
                [0xf8, 3, 0, 0],
                TRACK_END,
            ],
        )],
    );
    let smf_bytes = convert(&data);
    let smf = Smf::parse(&smf_bytes).unwrap();

    let keys: Vec<_> = note_ons(&smf.tracks[1]).iter().map(|(t, _, k)| (*t, *k)).collect();
    assert_eq!(
        keys,
        vec![(0, 0x3c), (24, 0x3e), (48, 0x3c), (72, 0x3e), (96, 0x3c), (120, 0x3e)]
    );
}

#[test]
fn test_rcp_same_measure() {
    // Measure 2 repeats measure 1 (record 0, at byte 44 of the track)
    let data = rcp_song(
        48,
        120,
        &[(
            0,
            vec![
                [0x3c, 48, 40, 100],
                [0xfd, 0, 0, 0],
                [0xfc, 0, 0x2c, 0],
                [0x40, 48, 40, 100],
                TRACK_END,
            ],
        )],
    );
    let bytes = convert(&data);
    let smf = Smf::parse(&bytes).unwrap();

    let keys: Vec<_> = note_ons(&smf.tracks[1]).iter().map(|(t, _, k)| (*t, *k)).collect();
    assert_eq!(keys, vec![(0, 0x3c), (48, 0x3c), (96, 0x40)]);
}

#[test]
fn test_rcp_comment_and_title() {
    let mut data = rcp_song(
        48,
        120,
        &[(
            0,
            vec![
                [0xf6, 0, b'H', b'e'],
                [0xf7, 0, b'l', b'l'],
                [0xf7, 0, b'o', b' '],
                [0x3c, 48, 48, 100],
                TRACK_END,
            ],
        )],
    );
    data[rcp::offset::TITLE..rcp::offset::TITLE + 4].copy_from_slice(b"Song");

    let bytes = convert(&data);
    let smf = Smf::parse(&bytes).unwrap();

    let conductor = absolute(&smf.tracks[0]);
    assert!(conductor.contains(&(0, TrackEventKind::Meta(MetaMessage::TrackName(b"Song")))));

    let track = absolute(&smf.tracks[1]);
    assert!(track.contains(&(0, TrackEventKind::Meta(MetaMessage::Text(b"Hello ")))));
}

#[test]
fn test_rcp_tempo_change_goes_to_conductor() {
    let data = rcp_song(
        48,
        120,
        &[
            (0, vec![[0x3c, 48, 48, 100], TRACK_END]),
            (1, vec![[0x00, 48, 0, 0], [0xe7, 0, 32, 0], [0x3c, 48, 48, 100], TRACK_END]),
        ],
    );
    let bytes = convert(&data);
    let smf = Smf::parse(&bytes).unwrap();

    // Half speed from tick 48
    assert_eq!(tempos(&smf.tracks[0]), vec![(0, 500_000), (48, 1_000_000)]);
}

#[test]
fn test_strict_policy_rejects_unknown_event() {
    init_logger();
    let data = rcp_song(48, 120, &[(0, vec![[0xf0, 0, 0, 0], [0x3c, 48, 48, 100], TRACK_END])]);

    assert!(Converter::new(Settings::default()).convert(&data).is_ok());

    let mut strict = Settings::default();
    strict.apply_pair("ignoreWrongEvent=false").unwrap();
    let result = Converter::new(strict).convert(&data);
    assert!(matches!(result, Err(Error::Violation(_))));
}

#[test]
fn test_note_off_setting() {
    init_logger();
    let data = rcp_song(48, 120, &[(2, vec![[0x3c, 48, 24, 100], TRACK_END])]);
    let mut settings = Settings::default();
    settings.apply_pair("noteOff=noteOff").unwrap();
    settings.apply_pair("noteOffVelocity=0x30").unwrap();

    let bytes = Converter::new(settings).convert(&data).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    let events = absolute(&smf.tracks[1]);
    assert!(events.contains(&(
        24,
        TrackEventKind::Midi {
            channel: 2.into(),
            message: MidiMessage::NoteOff {
                key: 0x3c.into(),
                vel: 0x30.into()
            },
        }
    )));
}

#[test]
fn test_not_recognized() {
    init_logger();
    let result = Converter::new(Settings::default()).convert(&[0x55; 0x400]);
    assert!(matches!(result, Err(Error::NotRecognized)));
}

// =============================================================================
// G36 and MCP
// =============================================================================

#[test]
fn test_g36_song() {
    let data = g36_song(
        480,
        90,
        &[(3, vec![[0x3c, 100, 0xe0, 0x01, 0xc0, 0x01], [0x3e, 90, 0xe0, 0x01, 0xe0, 0x01], [0xfe, 0, 0, 0, 0, 0]])],
    );
    let bytes = convert(&data);
    let smf = Smf::parse(&bytes).unwrap();

    assert_eq!(smf.header.timing, Timing::Metrical(480.into()));
    assert_eq!(tempos(&smf.tracks[0]), vec![(0, 666_666)]);
    assert_eq!(note_ons(&smf.tracks[1]), vec![(0, 3, 0x3c), (480, 3, 0x3e)]);
    assert!(matches!(
        smf.tracks[1].last().map(|e| e.kind),
        Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
    ));
    assert_eq!(absolute(&smf.tracks[1]).last().map(|(t, _)| *t), Some(960));
}

#[test]
fn test_mcp_rhythm_patterns() {
    let mut channels = [0u8; mcp::TRACK_COUNT];
    channels[1] = 1;
    let mut tracks = vec![Vec::new(); mcp::TRACK_COUNT];
    tracks[0] = vec![[36, 12, 6, 100], [42, 12, 6, 80], [0xfd, 0, 0, 0], [38, 24, 6, 100], [0xfd, 0, 0, 0]];
    tracks[1] = vec![[0x3c, 48, 48, 100]];
    tracks[9] = vec![[0, 24, 0, 0], [1, 24, 0, 0]];

    let bytes = convert(&mcp_song(120, channels, &tracks));
    let smf = Smf::parse(&bytes).unwrap();

    // Pattern track is consumed, empty parts are dropped
    assert_eq!(smf.tracks.len(), 3);
    assert_eq!(smf.header.timing, Timing::Metrical(48.into()));
    assert_eq!(note_ons(&smf.tracks[1]), vec![(0, 0, 0x3c)]);
    assert_eq!(note_ons(&smf.tracks[2]), vec![(0, 9, 36), (12, 9, 42), (24, 9, 38)]);
}

// =============================================================================
// Control files
// =============================================================================

#[test]
fn test_gsd_setup_measure() {
    init_logger();
    let dir = tempdir().unwrap();
    let mut data = rcp_song(48, 120, &[(0, vec![[0x3c, 48, 48, 100], TRACK_END])]);
    data[rcp::offset::GSD_FILE..rcp::offset::GSD_FILE + 8].copy_from_slice(b"SONG.GSD");

    let input = dir.path().join("song.rcp");
    let output = dir.path().join("song.mid");
    std::fs::write(&input, &data).unwrap();
    std::fs::write(dir.path().join("SONG.GSD"), gsd_dump()).unwrap();

    Converter::new(Settings::default())
        .convert_file(&input, &output)
        .expect("Conversion failed");

    let bytes = std::fs::read(&output).unwrap();
    let smf = Smf::parse(&bytes).unwrap();

    let sysexs: Vec<_> = absolute(&smf.tracks[0])
        .into_iter()
        .filter_map(|(time, kind)| match kind {
            TrackEventKind::SysEx(data) => Some((time, data)),
            _ => None,
        })
        .collect();
    assert_eq!(sysexs[0], (0, &GS_RESET[1..]));
    // Default system parameters are not sent again after the reset
    assert!(sysexs.len() < 68);
    assert!(sysexs.iter().all(|(time, _)| *time < 192));

    // The song itself starts one 4/4 measure later
    assert!(tempos(&smf.tracks[0]).contains(&(192, 500_000)));
    assert_eq!(note_ons(&smf.tracks[1]), vec![(192, 0, 0x3c)]);
}

#[test]
fn test_explicit_reader_and_missing_file() {
    init_logger();
    let dir = tempdir().unwrap();
    let mut data = rcp_song(48, 120, &[(0, vec![[0x3c, 48, 48, 100], TRACK_END])]);
    data[rcp::offset::GSD_FILE..rcp::offset::GSD_FILE + 8].copy_from_slice(b"GONE.GSD");

    let converter = Converter::new(Settings::default()).with_reader(FsControlFileReader::new(dir.path()));
    assert!(matches!(converter.convert(&data), Err(Error::ControlFileNotFound(_))));

    let mut settings = Settings::default();
    settings.apply_pair("ignoreCtrlFile=true").unwrap();
    let converter = Converter::new(settings).with_reader(FsControlFileReader::new(dir.path()));
    let bytes = converter.convert(&data).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(note_ons(&smf.tracks[1]), vec![(0, 0, 0x3c)]);

    // Without any reader the control file can't be fetched at all
    assert!(matches!(
        Converter::new(Settings::default()).convert(&data),
        Err(Error::NoControlFileReader(_))
    ));
}

#[test]
fn test_control_files_disabled() {
    init_logger();
    let mut data = rcp_song(48, 120, &[(0, vec![[0x3c, 48, 48, 100], TRACK_END])]);
    data[rcp::offset::GSD_FILE..rcp::offset::GSD_FILE + 8].copy_from_slice(b"SONG.GSD");

    let mut settings = Settings::default();
    settings.apply_pair("useCtrlFile=false").unwrap();
    let bytes = Converter::new(settings).convert(&data).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(note_ons(&smf.tracks[1]), vec![(0, 0, 0x3c)]);
}
