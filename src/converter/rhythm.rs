//! MCP rhythm pattern expansion

use super::extract::Event;
use crate::error::Result;
use crate::policy::Violation;
use crate::rcm::Opcode;
use crate::settings::Settings;

/// Split the pattern track into patterns at its Measure End markers
pub fn split_patterns(events: &[Event]) -> Vec<Vec<Event>> {
    let mut patterns = Vec::new();
    let mut current = Vec::new();
    for event in events {
        match event.op {
            Opcode::MeasureEnd => patterns.push(std::mem::take(&mut current)),
            Opcode::TrackEnd => break,
            _ => current.push(event.clone()),
        }
    }
    if !current.is_empty() {
        patterns.push(current);
    }
    patterns
}

/// Replace pattern references of the rhythm sequence with pattern contents
///
/// A reference lasts its own step time: a shorter pattern is padded with a
/// rest, a longer one runs over.
pub fn expand(sequence: &[Event], patterns: &[Vec<Event>], settings: &Settings) -> Result<Vec<Event>> {
    let mut expanded = Vec::with_capacity(sequence.len());
    for event in sequence {
        let Opcode::Note(number) = event.op else {
            expanded.push(event.clone());
            continue;
        };

        let Some(pattern) = patterns.get(number as usize) else {
            settings.check(Violation::InvalidRhythmPattern(number as u16))?;
            expanded.push(Event::rest(event.st));
            continue;
        };

        expanded.extend(pattern.iter().cloned());
        let length: u32 = pattern.iter().map(Event::step).sum();
        if length < event.st as u32 {
            expanded.push(Event::rest(event.st - length as u16));
        }
    }
    Ok(expanded)
}
