//! Stored setpoints and the two transitions allowed to change them.

use crate::types::Channel;

/// Last hardware-acknowledged setpoints, in physical units.
///
/// Only two things may change a value: [`SetpointStore::commit`] after the controller answered
/// `OK`, and [`SetpointStore::trip`] when the interlock is found open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetpointStore {
    voltage: f64,
    current: f64,
}

impl SetpointStore {
    /// Both setpoints at zero.
    pub const fn new() -> Self {
        Self {
            voltage: 0.0,
            current: 0.0,
        }
    }

    /// Stored value for a settable channel, `None` for read-only channels.
    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Voltage => Some(self.voltage),
            Channel::Current => Some(self.current),
            Channel::FilamentCurrent => None,
        }
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Record an acknowledged setpoint. Read-only channels are ignored.
    pub(crate) fn commit(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::Voltage => self.voltage = value,
            Channel::Current => self.current = value,
            Channel::FilamentCurrent => {}
        }
    }

    /// Interlock trip: zero both setpoints without touching the hardware.
    ///
    /// Returns the values held before the trip.
    pub(crate) fn trip(&mut self) -> Self {
        core::mem::replace(self, Self::new())
    }
}
