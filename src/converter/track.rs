//! Interpretation of one flattened track

use super::extract::Event;
use super::meta;
use super::sequence::TrackMap;
use super::template;
use crate::error::{Error, Result};
use crate::policy::{check_7bit, Violation};
use crate::rcm::text::field;
use crate::rcm::{HeaderFields, Opcode, TrackHeader};
use crate::settings::{NoteOffStyle, Settings};
use crate::sysex::{roland_dt1, MODEL_LA};
use log::{debug, warn};

/// A sounding note
#[derive(Debug, Clone, Copy)]
struct Held {
    /// Gate ticks left
    remaining: u32,
    /// Channel the note was started on
    channel: u8,
}

/// Song-wide inputs shared by every track
pub struct SongContext<'a> {
    pub header: &'a HeaderFields,
    pub settings: &'a Settings,
    /// MTD patch memory for User Program events
    pub patch_memory: Option<&'a [[u8; 8]]>,
}

/// Per-track conversion state
pub struct TrackConverter<'a> {
    song: &'a SongContext<'a>,
    track: TrackMap,
    held: [Option<Held>; 128],
    channel: Option<u8>,
    port: u8,
    transposition: i32,
    rol_dev: Option<[u8; 2]>,
    rol_base: Option<[u8; 2]>,
    yam_dev: Option<[u8; 2]>,
    yam_base: Option<[u8; 2]>,
    time: i64,
}

impl<'a> TrackConverter<'a> {
    pub fn new(song: &'a SongContext<'a>, header: &TrackHeader, start: i64) -> Self {
        Self {
            song,
            track: TrackMap::new(),
            held: [None; 128],
            channel: header.channel(),
            port: header.port(),
            transposition: header.transposition(song.header.play_bias),
            rol_dev: None,
            rol_base: None,
            yam_dev: None,
            yam_base: None,
            time: start,
        }
    }

    /// Direct access for track-level meta events placed by the caller
    pub fn track_mut(&mut self) -> &mut TrackMap {
        &mut self.track
    }

    /// Interpret all events, returning the track and its end tick
    ///
    /// Tempo, key and cue events go to `conductor`.
    pub fn run(mut self, events: &[Event], conductor: &mut TrackMap) -> Result<(TrackMap, i64)> {
        let mcp = self.song.header.is_mcp();
        for event in events {
            let step = self.dispatch(event, conductor)?;
            // MCP releases a note one step later when its gate equals the step
            let inclusive = !mcp || event.op == Opcode::TrackEnd;
            self.release_notes(step, inclusive);
            self.time += step as i64;
        }

        if let Some(rest) = self.longest_gate() {
            self.release_notes(rest, true);
            self.time += rest as i64;
        }

        self.track.insert(self.time, meta::end_of_track());
        Ok((self.track, self.time))
    }

    /// Handle one event and return how far it advances the track
    fn dispatch(&mut self, event: &Event, conductor: &mut TrackMap) -> Result<u32> {
        let song = self.song;
        let settings = song.settings;
        let (gt, vel) = (event.gt as i32, event.vel as i32);

        match event.op {
            Opcode::Note(key) => {
                if event.gt > 0 && event.vel > 0 {
                    self.note_on(key, event.gt, event.vel)?;
                }
            }

            Opcode::UserExclusive(n) => {
                if self.checked(&[gt, vel])? {
                    if let Some(exclusive) = song.header.user_exclusives.get(n as usize) {
                        if settings.meta_text_usr_exc {
                            let memo = field(&exclusive.memo, settings.trim_usr_exc_memo);
                            if !memo.is_empty() {
                                self.emit(meta::text(meta::TEXT, memo));
                            }
                        }
                        self.emit_template(&exclusive.bytes, event)?;
                    }
                }
            }
            Opcode::TrackExclusive => {
                if self.checked(&[gt, vel])? {
                    self.emit_template(&event.data, event)?;
                }
            }
            Opcode::DeviceSysEx(prefix) => {
                if self.checked(&[gt, vel])? {
                    let mut sysex = vec![0xf0];
                    sysex.extend_from_slice(prefix);
                    sysex.extend_from_slice(&[gt as u8, vel as u8, 0xf7]);
                    self.emit(sysex);
                }
            }

            Opcode::RolBase => {
                if self.checked(&[gt, vel])? {
                    self.rol_base = Some([gt as u8, vel as u8]);
                }
            }
            Opcode::RolDev => {
                if self.checked(&[gt, vel])? {
                    self.rol_dev = Some([gt as u8, vel as u8]);
                }
            }
            Opcode::RolPara => {
                if self.checked(&[gt, vel])? {
                    let dev = *self.rol_dev.get_or_insert_with(|| {
                        let dev = [settings.rol_dev_device_id, settings.rol_dev_model_id];
                        warn!("RolDev# has not been set yet. Initialized to {:02x?}.", dev);
                        dev
                    });
                    let base = *self.rol_base.get_or_insert_with(|| {
                        warn!("RolBase has not been set yet. Initialized to [00, 00].");
                        [0x00, 0x00]
                    });
                    let bytes = [0x41, dev[0], dev[1], 0x12, 0x83, base[0], base[1], 0x80, 0x81, 0x84];
                    self.emit_template(&bytes, event)?;
                }
            }

            Opcode::YamBase => {
                if self.checked(&[gt, vel])? {
                    self.yam_base = Some([gt as u8, vel as u8]);
                }
            }
            Opcode::YamDev => {
                if self.checked(&[gt, vel])? {
                    self.yam_dev = Some([gt as u8, vel as u8]);
                }
            }
            Opcode::YamPara | Opcode::XgPara => {
                if self.checked(&[gt, vel])? {
                    if event.op == Opcode::XgPara {
                        self.yam_dev = Some([0x10, 0x4c]);
                    }
                    let dev = *self.yam_dev.get_or_insert_with(|| {
                        let dev = [settings.yam_dev_device_id, settings.yam_dev_model_id];
                        warn!("YamDev# has not been set yet. Initialized to {:02x?}.", dev);
                        dev
                    });
                    let base = *self.yam_base.get_or_insert_with(|| {
                        warn!("YamBase has not been set yet. Initialized to [00, 00].");
                        [0x00, 0x00]
                    });
                    self.emit(vec![0xf0, 0x43, dev[0], dev[1], base[0], base[1], gt as u8, vel as u8, 0xf7]);
                }
            }

            Opcode::BankPrgLsb | Opcode::BankPrgMsb => {
                if self.checked(&[gt, vel])? {
                    let controller = if event.op == Opcode::BankPrgMsb { 0 } else { 32 };
                    self.channel_message(0xb0, &[controller, vel as u8]);
                    self.channel_message(0xc0, &[gt as u8]);
                }
            }
            Opcode::ChannelAftertouch => {
                if self.checked(&[gt])? {
                    self.channel_message(0xd0, &[gt as u8]);
                }
            }
            Opcode::ControlChange => {
                if self.checked(&[gt, vel])? {
                    self.channel_message(0xb0, &[gt as u8, vel as u8]);
                }
            }
            Opcode::ProgramChange => {
                if self.checked(&[gt])? {
                    self.channel_message(0xc0, &[gt as u8]);
                }
            }
            Opcode::KeyAftertouch => {
                if self.checked(&[gt, vel])? {
                    self.channel_message(0xa0, &[gt as u8, vel as u8]);
                }
            }
            Opcode::PitchBend => {
                if self.checked(&[gt, vel])? {
                    self.channel_message(0xe0, &[gt as u8, vel as u8]);
                }
            }
            Opcode::UserProgram => self.user_program(event.gt)?,

            Opcode::MidiChannel => match event.gt {
                0 => debug!("MIDI CH. 0 keeps the current channel"),
                1..=32 => {
                    let midi = (event.gt - 1) as u8;
                    self.channel = Some(midi % 16);
                    if midi / 16 != self.port {
                        self.port = midi / 16;
                        self.emit(meta::port(self.port));
                    }
                }
                _ => settings.check(Violation::OutOfRange(vec![gt]))?,
            },

            Opcode::Tempo => {
                if event.gt == 0 {
                    return Err(Error::InvalidTempo("relative tempo of 0".into()));
                }
                let usec = 60_000_000 * 64 / (song.header.tempo as u64 * event.gt as u64);
                conductor.insert(self.time, meta::tempo(usec));
            }
            Opcode::MusicKey => {
                conductor.insert(self.time, meta::key_signature(event.st as u8));
            }
            Opcode::Comment => {
                if settings.meta_text_comment {
                    let text = field(&event.data, settings.trim_comment);
                    if !text.is_empty() {
                        self.emit(meta::text(meta::TEXT, text));
                    }
                }
            }
            Opcode::ExternalCommand => {
                if settings.meta_cue {
                    let kind: &[u8] = match event.gt {
                        0 => b"MCI:",
                        1 => b"RUN:",
                        _ => b"???:",
                    };
                    conductor.insert(self.time, meta::text(meta::CUE_POINT, &[kind, event.data.as_slice()].concat()));
                }
            }
            Opcode::KeyScan => {
                if settings.meta_cue {
                    let text = format!("KeyScan: {}", key_scan_cue(event.gt));
                    conductor.insert(self.time, meta::text(meta::CUE_POINT, text.as_bytes()));
                }
            }

            Opcode::MeasureEnd => {}
            Opcode::TrackEnd => return Ok(self.longest_gate().unwrap_or(0)),

            Opcode::SecondEvent | Opcode::LoopEnd | Opcode::LoopStart | Opcode::SameMeasure => {
                debug!("Unresolved {:?} event. Ignored.", event.op);
            }
            Opcode::Unknown(cmd) => settings.check(Violation::UnknownEvent(cmd))?,
        }

        Ok(event.step())
    }

    fn note_on(&mut self, key: u8, gt: u16, vel: u8) -> Result<()> {
        let note = key as i32 + self.transposition;
        if !(0..0x80).contains(&note) {
            return self.song.settings.check(Violation::NoteOutOfRange(note));
        }
        if !self.checked(&[vel as i32])? {
            return Ok(());
        }
        let Some(channel) = self.channel else {
            return Ok(());
        };

        if let Some(held) = self.held[note as usize].as_mut() {
            // Tie: keep sounding with the new gate
            held.remaining = gt as u32;
        } else {
            self.track.insert(self.time, vec![0x90 | channel, note as u8, vel]);
            self.held[note as usize] = Some(Held {
                remaining: gt as u32,
                channel,
            });
        }
        Ok(())
    }

    /// Emit note-offs for notes whose gate ends within `step`
    fn release_notes(&mut self, step: u32, inclusive: bool) {
        for note in 0..self.held.len() {
            let Some(held) = self.held[note] else {
                continue;
            };
            let due = if inclusive {
                held.remaining <= step
            } else {
                held.remaining < step
            };
            if due {
                let message = note_off(self.song.settings, held.channel, note as u8);
                self.track.insert(self.time + held.remaining as i64, message);
                self.held[note] = None;
            } else {
                self.held[note] = Some(Held {
                    remaining: held.remaining - step,
                    ..held
                });
            }
        }
    }

    fn longest_gate(&self) -> Option<u32> {
        self.held.iter().flatten().map(|h| h.remaining).max()
    }

    /// MCP User Program: send a patch from the MTD patch memory
    fn user_program(&mut self, number: u16) -> Result<()> {
        let patch = self
            .song
            .patch_memory
            .and_then(|table| table.get(number as usize));
        let part = self.channel.filter(|ch| (1..=8).contains(ch));

        match (patch, part) {
            (Some(patch), Some(part)) => {
                let address = [0x03, 0x00, (part - 1) * 0x10];
                self.emit(roland_dt1(MODEL_LA, address, patch));
            }
            _ => {
                warn!(
                    "User program {} is not available. Sent as a program change.",
                    number
                );
                self.channel_message(0xc0, &[(number & 0x7f) as u8]);
            }
        }
        Ok(())
    }

    /// Run a validation through the policy; `false` means skip the event
    fn checked(&self, values: &[i32]) -> Result<bool> {
        match check_7bit(values) {
            Ok(()) => Ok(true),
            Err(violation) => self.song.settings.check(violation).map(|()| false),
        }
    }

    fn emit_template(&mut self, template: &[u8], event: &Event) -> Result<()> {
        match template::fill(template, self.channel, event.gt, event.vel) {
            Ok(sysex) => self.emit(sysex),
            Err(violation) => self.song.settings.check(violation)?,
        }
        Ok(())
    }

    fn channel_message(&mut self, status: u8, data: &[u8]) {
        match self.channel {
            Some(channel) => {
                let mut message = vec![status | channel];
                message.extend_from_slice(data);
                self.emit(message);
            }
            None => debug!("Channel message {:02x} on a track without channel. Skipped.", status),
        }
    }

    fn emit(&mut self, message: Vec<u8>) {
        self.track.insert(self.time, message);
    }
}

fn note_off(settings: &Settings, channel: u8, note: u8) -> Vec<u8> {
    match settings.note_off {
        NoteOffStyle::NoteOnZero => vec![0x90 | channel, note, 0],
        NoteOffStyle::NoteOff => vec![0x80 | channel, note, settings.note_off_velocity & 0x7f],
    }
}

fn key_scan_cue(code: u16) -> &'static str {
    match code {
        12 => "suspend playing",
        18 => "increase play bias",
        23 => "stop playing",
        32 => "show main screen",
        33 => "show 11th track",
        34 => "show 12th track",
        35 => "show 13th track",
        36 => "show 14th track",
        37 => "show 15th track",
        38 => "show 16th track",
        39 => "show 17th track",
        40 => "show 18th track",
        48 => "show 10th track",
        49 => "show 1st track",
        50 => "show 2nd track",
        51 => "show 3rd track",
        52 => "show 4th track",
        53 => "show 5th track",
        54 => "show 6th track",
        55 => "show 7th track",
        56 => "show 8th track",
        57 => "show 9th track",
        61 => "mute 1st track",
        _ => "unknown",
    }
}
