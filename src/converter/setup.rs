//! Setup measure scheduling
//!
//! Device setup messages are sent in a leading measure. Each one gets a
//! slice of the measure proportional to how long a real device needs to
//! receive and digest it, and the measure's tempo is chosen so that no
//! message is sent faster than that.

use crate::sysex::{parse_dt1, GS_RESET, LA_RESET, MODEL_LA, YAMAHA_ID};

/// Wire time of one byte at 31250 baud (10 bits per byte)
pub const USEC_PER_BYTE: u64 = 320;

/// Placement of one setup message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing<'a> {
    pub sysex: &'a [u8],
    pub ticks: u32,
    /// Tempo at which `ticks` is exactly as long as the message needs
    pub usec_per_beat: u64,
}

/// Length of the setup measure in ticks
///
/// The song's own measure, lengthened by whole beats to at least four
/// quarter notes. 3/4 and 6/8 keep three quarter notes.
pub fn setup_measure_len(beat_n: u8, beat_d: u8, time_base: u16) -> u32 {
    let time_base = time_base as u32;
    let (beat_n, beat_d) = if beat_d.is_power_of_two() && beat_n > 0 {
        (beat_n as u32, beat_d as u32)
    } else {
        (4, 4)
    };
    if (beat_n, beat_d) == (3, 4) || (beat_n, beat_d) == (6, 8) {
        return time_base * 3;
    }

    let unit = (time_base * 4 / beat_d).max(1);
    let mut len = unit * beat_n;
    while len < time_base * 4 {
        len += unit;
    }
    len
}

/// Time a device needs after receiving a message, beyond the transfer
pub fn settle_usec(sysex: &[u8]) -> u64 {
    if sysex == GS_RESET {
        return 50_000;
    }
    if sysex == LA_RESET {
        return 420_000;
    }
    // XG System On
    if sysex.len() == 9
        && sysex[1] == YAMAHA_ID
        && sysex[2] & 0xf0 == 0x10
        && sysex[3..8] == [0x4c, 0x00, 0x00, 0x7e, 0x00]
    {
        return 50_000;
    }
    // GM System On
    if sysex.len() == 6 && sysex[1..5] == [0x7e, 0x7f, 0x09, 0x01] {
        return 50_000;
    }
    // Timbre memory writes of LA devices
    match parse_dt1(sysex) {
        Some(dt1) if dt1.model == MODEL_LA && dt1.address[0] == 0x08 => 40_000,
        _ => 0,
    }
}

fn cost_usec(sysex: &[u8]) -> u64 {
    sysex.len() as u64 * USEC_PER_BYTE + settle_usec(sysex)
}

fn usec_per_beat(cost: u64, ticks: u32, time_base: u16) -> u64 {
    cost * time_base as u64 / ticks as u64
}

/// Spread messages over `total_ticks`
///
/// Expects at most `total_ticks` messages. Every message gets at least one
/// tick and the ticks add up to exactly `total_ticks`.
pub fn schedule(sysexs: &[Vec<u8>], total_ticks: u32, time_base: u16) -> Vec<Timing<'_>> {
    if sysexs.is_empty() {
        return Vec::new();
    }
    debug_assert!(sysexs.len() <= total_ticks as usize);

    let costs: Vec<u64> = sysexs.iter().map(|s| cost_usec(s)).collect();
    let total_cost: u64 = costs.iter().sum::<u64>().max(1);

    let mut timings: Vec<Timing> = sysexs
        .iter()
        .zip(&costs)
        .map(|(sysex, &cost)| {
            let ticks = ((cost * total_ticks as u64 / total_cost) as u32).max(1);
            Timing {
                sysex,
                ticks,
                usec_per_beat: usec_per_beat(cost, ticks, time_base),
            }
        })
        .collect();
    let sum = |timings: &[Timing]| timings.iter().map(|t| t.ticks as u64).sum::<u64>();

    // Over budget: take ticks from the fastest messages
    while sum(&timings) > total_ticks as u64 {
        let Some(min) = timings
            .iter()
            .filter(|t| t.ticks > 1)
            .map(|t| t.usec_per_beat)
            .min()
        else {
            break;
        };
        for (timing, &cost) in timings.iter_mut().zip(&costs) {
            if timing.ticks > 1 && timing.usec_per_beat == min {
                timing.ticks -= 1;
                timing.usec_per_beat = usec_per_beat(cost, timing.ticks, time_base);
            }
        }
    }

    // Under budget: give ticks to the slowest messages
    while sum(&timings) < total_ticks as u64 {
        let Some(max) = timings.iter().map(|t| t.usec_per_beat).max() else {
            break;
        };
        // Ties that don't all fit share what is left in list order
        let mut left = total_ticks as u64 - sum(&timings);
        for (timing, &cost) in timings.iter_mut().zip(&costs) {
            if left > 0 && timing.usec_per_beat == max {
                timing.ticks += 1;
                timing.usec_per_beat = usec_per_beat(cost, timing.ticks, time_base);
                left -= 1;
            }
        }
    }

    timings
}
