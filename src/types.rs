//! This module contains types relevant to the Spellman ASCII protocol.

use strum_macros::{Display, EnumIter};

/// Line terminator used for every frame in both directions.
pub const LF: u8 = b'\n';

/// Acknowledgement token returned for an accepted setpoint.
pub const ACK: &str = "OK";

/// Output enable.
pub const CMD_ON: &str = ":ON";
/// Output disable.
pub const CMD_OFF: &str = ":OFF";
/// Interlock status query.
pub const CMD_INTERLOCK: &str = ":ILOCK?";
/// Identification query.
pub const CMD_IDN: &str = "*IDN?";

/// The measurement channels of the controller.
#[derive(Debug, Display, EnumIter, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Channel {
    /// Output voltage in kV.
    Voltage,
    /// Output current in mA.
    Current,
    /// Filament current in mA. Read-only.
    #[strum(to_string = "Filament Current")]
    FilamentCurrent,
}

impl Channel {
    /// Physical unit of the channel.
    pub const fn unit(&self) -> &'static str {
        match self {
            Channel::Voltage => "kV",
            Channel::Current | Channel::FilamentCurrent => "mA",
        }
    }

    /// Mnemonic used to read back the channel's ADC code.
    pub const fn query_mnemonic(&self) -> &'static str {
        match self {
            Channel::Voltage => ":V?",
            Channel::Current => ":C?",
            Channel::FilamentCurrent => ":FIL?",
        }
    }

    /// Mnemonic prefix used to write a DAC code, `None` for read-only channels.
    pub const fn set_mnemonic(&self) -> Option<&'static str> {
        match self {
            Channel::Voltage => Some(":V"),
            Channel::Current => Some(":C"),
            Channel::FilamentCurrent => None,
        }
    }

    pub const fn is_settable(&self) -> bool {
        self.set_mnemonic().is_some()
    }
}

/// Interlock status as reported by `:ILOCK?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterlockStatus {
    /// Interlock open: the controller has cut its output.
    Open,
    /// Interlock closed: output may be energized.
    Closed,
    /// Anything else the controller reports, kept verbatim.
    Unknown(String),
}

impl InterlockStatus {
    /// Parse a raw status frame. Surrounding whitespace and letter case are ignored.
    pub fn parse(raw: &str) -> Self {
        let status = raw.trim();
        if status.eq_ignore_ascii_case("open") {
            InterlockStatus::Open
        } else if status.eq_ignore_ascii_case("closed") {
            InterlockStatus::Closed
        } else {
            InterlockStatus::Unknown(raw.to_owned())
        }
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self, InterlockStatus::Open)
    }

    pub fn as_str(&self) -> &str {
        match self {
            InterlockStatus::Open => "open",
            InterlockStatus::Closed => "closed",
            InterlockStatus::Unknown(raw) => raw,
        }
    }
}

impl core::fmt::Display for InterlockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a device instance.
#[derive(Debug, Display, PartialEq, Eq, Clone, Copy)]
pub enum DeviceState {
    /// Connecting and computing scale factors. The link is not used yet.
    Initializing,
    /// Connected; operations may be issued.
    Ready,
    /// Connection failed during initialization. Terminal.
    Faulted,
}
