//! Intermediate multi-track representation

use log::warn;
use std::collections::BTreeMap;

/// Time-sorted messages of one output track
///
/// Messages are complete MIDI, SysEx or meta events without their delta
/// time. Messages sharing a tick keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct TrackMap {
    events: BTreeMap<u32, Vec<Vec<u8>>>,
}

impl TrackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, moving anything before tick 0 to tick 0
    pub fn insert(&mut self, time: i64, message: Vec<u8>) {
        let time = if time < 0 {
            warn!("An event appeared before the zero point due to ST+. Adjusted it to zero.");
            0
        } else {
            time.min(u32::MAX as i64) as u32
        };
        self.events.entry(time).or_default().push(message);
    }

    /// All messages in time order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.events
            .iter()
            .flat_map(|(&time, messages)| messages.iter().map(move |m| (time, m.as_slice())))
    }

    pub fn last_time(&self) -> Option<u32> {
        self.events.keys().next_back().copied()
    }
}

/// Converted song, ready for serialization
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Ticks per quarter note
    pub time_base: u16,
    /// Conductor track first
    pub tracks: Vec<TrackMap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_clamp() {
        let mut track = TrackMap::new();
        track.insert(10, vec![2]);
        track.insert(0, vec![0]);
        track.insert(10, vec![3]);
        track.insert(-5, vec![1]);
        let order: Vec<_> = track.iter().map(|(t, m)| (t, m[0])).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (10, 2), (10, 3)]);
        assert_eq!(track.last_time(), Some(10));
    }
}
