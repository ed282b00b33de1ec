//! Serialized access to one device from many callers.
//!
//! The protocol allows a single outstanding request, so every operation takes the device lock for its
//! whole exchange. Composite actions such as [`SharedPsu::enable`] hold it across all their exchanges.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::psu::SpellmanPsu;
use crate::setpoint::SetpointStore;
use crate::types::{Channel, DeviceState, InterlockStatus};

/// Cloneable handle to a device shared between threads.
pub struct SharedPsu<
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
    const L: usize = 1024,
> {
    inner: Arc<Mutex<SpellmanPsu<S, L>>>,
}

impl<S, const L: usize> Clone for SharedPsu<S, L>
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, const L: usize> SharedPsu<S, L>
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    pub fn new(psu: SpellmanPsu<S, L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(psu)),
        }
    }

    /// Run `f` with exclusive access to the device.
    ///
    /// A panic in another holder does not leave the device inconsistent: stored setpoints only change after a
    /// complete acknowledged exchange, so a poisoned lock is taken over.
    pub fn with<R>(&self, f: impl FnOnce(&mut SpellmanPsu<S, L>) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, SpellmanPsu<S, L>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> DeviceState {
        self.lock().state()
    }

    pub fn setpoints(&self) -> SetpointStore {
        self.lock().setpoints()
    }

    pub fn get_voltage_setpoint(&self) -> f64 {
        self.lock().get_voltage_setpoint()
    }

    pub fn get_current_setpoint(&self) -> f64 {
        self.lock().get_current_setpoint()
    }

    pub fn set_voltage(&self, kilovolts: f64) -> Result<f64, S::Error> {
        self.lock().set_voltage(kilovolts)
    }

    pub fn set_current(&self, milliamps: f64) -> Result<f64, S::Error> {
        self.lock().set_current(milliamps)
    }

    pub fn read_channel(&self, channel: Channel) -> Result<f64, S::Error> {
        self.lock().read_channel(channel)
    }

    pub fn read_voltage(&self) -> Result<f64, S::Error> {
        self.lock().read_voltage()
    }

    pub fn read_current(&self) -> Result<f64, S::Error> {
        self.lock().read_current()
    }

    pub fn read_filament_current(&self) -> Result<f64, S::Error> {
        self.lock().read_filament_current()
    }

    pub fn read_interlock(&self) -> Result<InterlockStatus, S::Error> {
        self.lock().read_interlock()
    }

    pub fn enable(&self) -> Result<String, S::Error> {
        self.lock().enable()
    }

    pub fn disable(&self) -> Result<String, S::Error> {
        self.lock().disable()
    }

    pub fn identify(&self) -> Result<String, S::Error> {
        self.lock().identify()
    }
}
