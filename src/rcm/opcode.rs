//! Event opcodes and per-dialect decoding of raw event records

use super::Dialect;

/// Decoded event command
///
/// RCP and G36 share one raw byte assignment, MCP has its own. Both are
/// mapped onto this enumeration so the interpreter never looks at raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Note with its (untransposed) key number
    Note(u8),
    /// UsrExc0-7: user exclusive template from the file header
    UserExclusive(u8),
    /// Tr.Excl: exclusive template carried by the track itself
    TrackExclusive,
    ExternalCommand,
    /// Fixed-layout parameter SysEx for a specific device, holds the bytes
    /// between F0 and the two data bytes
    DeviceSysEx(&'static [u8]),
    YamBase,
    YamDev,
    YamPara,
    XgPara,
    RolBase,
    RolPara,
    RolDev,
    BankPrgLsb,
    BankPrgMsb,
    UserProgram,
    KeyScan,
    MidiChannel,
    Tempo,
    ChannelAftertouch,
    ControlChange,
    ProgramChange,
    KeyAftertouch,
    PitchBend,
    MusicKey,
    Comment,
    SecondEvent,
    LoopEnd,
    LoopStart,
    SameMeasure,
    MeasureEnd,
    TrackEnd,
    Unknown(u8),
}

impl Opcode {
    /// Map a raw command byte of the RCP family (RCP and G36)
    pub fn from_rcp(cmd: u8) -> Self {
        match cmd {
            0x00..=0x7f => Opcode::Note(cmd),
            0x90..=0x97 => Opcode::UserExclusive(cmd - 0x90),
            0x98 => Opcode::TrackExclusive,
            0x99 => Opcode::ExternalCommand,
            0xc0 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x08]), // DX7FUNC
            0xc1 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x00]), // DX.PARA
            0xc2 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x04]), // DX.PERF
            0xc3 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x11]), // TX.FUNC
            0xc5 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x15]), // FB-01 P
            0xc6 => Opcode::DeviceSysEx(&[0x43, 0x75, 0x01, 0x10]), // FB-01 S
            0xc7 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x12]), // TX81Z V
            0xc8 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x13]), // TX81Z A
            0xc9 => Opcode::DeviceSysEx(&[0x43, 0x11, 0x10]), // TX81Z P
            0xca => Opcode::DeviceSysEx(&[0x43, 0x11, 0x10, 0x7b]), // TX81Z S
            0xcb => Opcode::DeviceSysEx(&[0x43, 0x11, 0x10, 0x7c]), // TX81Z E
            0xcc => Opcode::DeviceSysEx(&[0x43, 0x11, 0x1b]), // DX7-2 R
            0xcd => Opcode::DeviceSysEx(&[0x43, 0x11, 0x18]), // DX7-2 A
            0xce => Opcode::DeviceSysEx(&[0x43, 0x11, 0x19]), // DX7-2 P
            0xcf => Opcode::DeviceSysEx(&[0x43, 0x11, 0x1a]), // TX802 P
            0xdc => Opcode::DeviceSysEx(&[0x41, 0x32, 0x01]), // MKS-7
            0xd0 => Opcode::YamBase,
            0xd1 => Opcode::YamDev,
            0xd2 => Opcode::YamPara,
            0xd3 => Opcode::XgPara,
            0xdd => Opcode::RolBase,
            0xde => Opcode::RolPara,
            0xdf => Opcode::RolDev,
            0xe1 => Opcode::BankPrgLsb,
            0xe2 => Opcode::BankPrgMsb,
            0xe5 => Opcode::KeyScan,
            0xe6 => Opcode::MidiChannel,
            0xe7 => Opcode::Tempo,
            0xea => Opcode::ChannelAftertouch,
            0xeb => Opcode::ControlChange,
            0xec => Opcode::ProgramChange,
            0xed => Opcode::KeyAftertouch,
            0xee => Opcode::PitchBend,
            0xf5 => Opcode::MusicKey,
            0xf6 => Opcode::Comment,
            0xf7 => Opcode::SecondEvent,
            0xf8 => Opcode::LoopEnd,
            0xf9 => Opcode::LoopStart,
            0xfc => Opcode::SameMeasure,
            0xfd => Opcode::MeasureEnd,
            0xfe => Opcode::TrackEnd,
            _ => Opcode::Unknown(cmd),
        }
    }

    /// Map a raw command byte of the MCP dialect
    pub fn from_mcp(cmd: u8) -> Self {
        match cmd {
            0x00..=0x7f => Opcode::Note(cmd),
            0xe7 => Opcode::Tempo,
            0xea => Opcode::ChannelAftertouch,
            0xeb => Opcode::ControlChange,
            0xec => Opcode::ProgramChange,
            0xed => Opcode::UserProgram,
            0xee => Opcode::PitchBend,
            0xf8 => Opcode::LoopEnd,
            0xf9 => Opcode::LoopStart,
            0xfd => Opcode::MeasureEnd,
            0xfe => Opcode::TrackEnd,
            _ => Opcode::Unknown(cmd),
        }
    }

    pub fn decode(dialect: Dialect, cmd: u8) -> Self {
        match dialect {
            Dialect::Rcp | Dialect::G36 => Self::from_rcp(cmd),
            Dialect::Mcp => Self::from_mcp(cmd),
        }
    }

    /// Events that swallow following 2nd-event (F7) records
    pub fn is_multi_record(self) -> bool {
        matches!(
            self,
            Opcode::TrackExclusive | Opcode::ExternalCommand | Opcode::Comment
        )
    }

    /// Measure boundaries, as far as Same Measure resolution is concerned
    pub fn is_measure_boundary(self) -> bool {
        matches!(self, Opcode::MeasureEnd | Opcode::SameMeasure)
    }

    /// Whether the record's step-time field really advances time
    pub fn has_step_time(self) -> bool {
        !matches!(
            self,
            Opcode::MusicKey
                | Opcode::Comment
                | Opcode::SecondEvent
                | Opcode::LoopEnd
                | Opcode::LoopStart
                | Opcode::SameMeasure
                | Opcode::MeasureEnd
                | Opcode::TrackEnd
                | Opcode::Unknown(_)
        )
    }
}

/// A fixed-width raw event record, exactly as stored in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    /// RCP and MCP
    Four([u8; 4]),
    /// G36
    Six([u8; 6]),
}

/// Canonical view of a raw record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub op: Opcode,
    pub st: u16,
    pub gt: u16,
    pub vel: u8,
}

impl RawEvent {
    pub fn cmd(&self) -> u8 {
        match self {
            RawEvent::Four(b) => b[0],
            RawEvent::Six(b) => b[0],
        }
    }

    pub fn opcode(&self, dialect: Dialect) -> Opcode {
        Opcode::decode(dialect, self.cmd())
    }

    /// Decode the step/gate/velocity fields
    pub fn canonical(&self, dialect: Dialect) -> Canonical {
        let op = self.opcode(dialect);
        match self {
            RawEvent::Four(b) => Canonical {
                op,
                st: b[1] as u16,
                gt: b[2] as u16,
                vel: b[3],
            },
            RawEvent::Six(b) => Canonical {
                op,
                st: u16::from_le_bytes([b[2], b[3]]),
                gt: u16::from_le_bytes([b[4], b[5]]),
                vel: b[1],
            },
        }
    }

    /// Text/data bytes carried by a Comment or 2nd-event record
    pub fn payload(&self) -> &[u8] {
        match self {
            RawEvent::Four(b) => &b[2..],
            RawEvent::Six(b) => &b[1..],
        }
    }

    /// `(measure, byte offset)` of a Same Measure record
    pub fn same_measure_target(&self) -> (u16, i64) {
        match self {
            RawEvent::Four(b) => {
                let measure = b[1] as u16 | ((b[2] as u16 & 0x03) << 8);
                let offset = (b[2] as i64 & 0xfc) | ((b[3] as i64) << 8);
                (measure, offset)
            }
            RawEvent::Six(b) => {
                let measure = u16::from_le_bytes([b[2], b[3]]);
                let offset = u16::from_le_bytes([b[4], b[5]]) as i64 * 6 - 0xf2;
                (measure, offset)
            }
        }
    }
}
