//! Flattening of a track's raw records
//!
//! Same Measure references are followed and loops are unrolled, so the
//! result can be interpreted in a single forward pass.

use crate::error::{Error, Result};
use crate::policy::Violation;
use crate::rcm::{Dialect, Opcode, RawEvent};
use crate::settings::Settings;
use log::{debug, warn};

/// A flattened event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub op: Opcode,
    pub st: u16,
    pub gt: u16,
    pub vel: u8,
    /// Concatenated payload of multi-record events
    pub data: Vec<u8>,
}

impl Event {
    pub fn new(op: Opcode, st: u16, gt: u16, vel: u8) -> Self {
        Self {
            op,
            st,
            gt,
            vel,
            data: Vec::new(),
        }
    }

    /// Measure End inserted around Same Measure expansions
    fn measure_end() -> Self {
        Self::new(Opcode::MeasureEnd, 0, 0xfc, 0xfc)
    }

    /// Silent event that only advances time
    pub fn rest(st: u16) -> Self {
        Self::new(Opcode::Note(0), st, 0, 0)
    }

    /// Ticks this event advances a track by
    pub fn step(&self) -> u32 {
        if self.op.has_step_time() {
            self.st as u32
        } else {
            0
        }
    }
}

#[derive(Debug)]
struct LoopFrame {
    /// Index of the Loop Start record
    index: usize,
    /// Same Measure return point when the loop was entered
    last_index: Option<usize>,
    /// Remaining passes, fixed at the first Loop End
    count: Option<u32>,
    /// Extracted length when the loop was entered
    extracted_index: usize,
}

/// Flatten a track's records
pub fn extract(
    events: &[RawEvent],
    dialect: Dialect,
    time_base: u16,
    settings: &Settings,
) -> Result<Vec<Event>> {
    let mut extracted: Vec<Event> = Vec::new();
    let mut frames: Vec<LoopFrame> = Vec::new();
    let mut last_index: Option<usize> = None;
    let mut index = 0;

    while index < events.len() {
        let raw = &events[index];
        let canonical = raw.canonical(dialect);
        let op = canonical.op;

        match op {
            Opcode::SameMeasure => {
                if let Some(last) = last_index.take() {
                    // Second Same Measure: the referenced measure is over
                    index = last + 1;
                    extracted.push(Event::measure_end());
                } else {
                    last_index = Some(index);
                    if index > 0 && !events[index - 1].opcode(dialect).is_measure_boundary() {
                        extracted.push(Event::measure_end());
                    }
                    index = follow_same_measure(events, index, dialect, settings.max_same_measure_jumps)?;
                }
            }

            Opcode::LoopStart => {
                if frames.len() < settings.max_loop_nest {
                    frames.push(LoopFrame {
                        index,
                        last_index,
                        count: None,
                        extracted_index: extracted.len(),
                    });
                } else {
                    warn!(
                        "Detected more than {}-level of nested loops. Ignored.",
                        settings.max_loop_nest
                    );
                }
                index += 1;
            }

            Opcode::LoopEnd => {
                let Some(frame) = frames.last_mut() else {
                    settings.check(Violation::DanglingLoopEnd)?;
                    index += 1;
                    continue;
                };

                let remaining = match frame.count {
                    Some(count) => count,
                    None => loop_count(canonical.st, &extracted[frame.extracted_index..], time_base, settings),
                };
                let remaining = remaining.saturating_sub(1);
                frame.count = Some(remaining);

                if remaining > 0 {
                    index = frame.index + 1;
                    last_index = frame.last_index;
                } else {
                    frames.pop();
                    index += 1;
                }
            }

            Opcode::TrackEnd | Opcode::MeasureEnd => {
                if op == Opcode::TrackEnd && !frames.is_empty() {
                    settings.check(Violation::UnclosedLoop(frames.len()))?;
                }
                index = match last_index.take() {
                    Some(last) => last + 1,
                    None => index + 1,
                };
                extracted.push(Event::new(op, canonical.st, canonical.gt, canonical.vel));
            }

            op if op.is_multi_record() => {
                // Comment text starts in the leading record, exclusive data
                // and command lines only in the 2nd-event records
                let mut data = if op == Opcode::Comment {
                    raw.payload().to_vec()
                } else {
                    Vec::new()
                };
                index += 1;
                while let Some(next) = events.get(index).filter(|e| e.opcode(dialect) == Opcode::SecondEvent) {
                    data.extend_from_slice(next.payload());
                    index += 1;
                }
                while data.last() == Some(&0xf7) {
                    data.pop();
                }

                let mut event = Event::new(op, canonical.st, canonical.gt, canonical.vel);
                event.data = data;
                extracted.push(event);
            }

            Opcode::SecondEvent => {
                settings.check(Violation::OrphanSecondEvent)?;
                index += 1;
            }

            _ => {
                extracted.push(Event::new(op, canonical.st, canonical.gt, canonical.vel));
                index += 1;
            }
        }
    }

    debug!("Extracted {} events from {} records", extracted.len(), events.len());
    Ok(extracted)
}

/// Resolve a (possibly chained) Same Measure reference to a record index
fn follow_same_measure(events: &[RawEvent], mut index: usize, dialect: Dialect, max_jumps: usize) -> Result<usize> {
    let header_len = dialect.track_header_len() as i64;
    let width = dialect.event_len() as i64;

    let mut jumps = 0;
    while let Some(event) = events.get(index).filter(|e| e.opcode(dialect) == Opcode::SameMeasure) {
        if jumps == max_jumps {
            return Err(Error::SameMeasureChain(max_jumps));
        }
        jumps += 1;

        let (measure, offset) = event.same_measure_target();
        let relative = offset - header_len;
        if relative < 0 || relative % width != 0 || relative / width >= events.len() as i64 {
            return Err(Error::InvalidJump { offset });
        }
        debug!("Same Measure: measure {} at record {}", measure, relative / width);
        index = (relative / width) as usize;
    }
    Ok(index)
}

/// Number of passes of a loop, with infinite loops and loop bombs tamed
fn loop_count(count: u16, body: &[Event], time_base: u16, settings: &Settings) -> u32 {
    let mut count = count as u32;
    if count == 0 {
        warn!(
            "Detected an infinite loop. Set number of loops to {}.",
            settings.infinity_loop_count
        );
        count = settings.infinity_loop_count;
    }

    let ticks: u64 = body.iter().map(|e| e.step() as u64).sum();
    let limit = settings.loop_bomb_threshold as u64 * time_base as u64;
    // Expanded length is bounded as well as duration
    let events = body.len() as u64 * count as u64;
    let exceeds = ticks * count as u64 > limit || events > settings.loop_bomb_events as u64;
    if exceeds && count > settings.infinity_loop_count {
        warn!(
            "Detected a loop bomb. Set number of loops to {}.",
            settings.infinity_loop_count
        );
        count = settings.infinity_loop_count;
    }
    count
}
