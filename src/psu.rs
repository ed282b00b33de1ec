use tracing::{info, warn};

use crate::{
    config::DeviceConfig,
    error::{ConnectError, Error, Result},
    link::Link,
    scaling::ChannelScaling,
    setpoint::SetpointStore,
    tcp::TcpTransport,
    types::{ACK, CMD_IDN, CMD_INTERLOCK, CMD_OFF, CMD_ON, Channel, DeviceState, InterlockStatus},
};

/// You can create a SpellmanPsu using any interface which implements [embedded_io::Read],
/// [embedded_io::ReadReady] & [embedded_io::Write].
///
/// For its methods, we generally use the nomenclature that "set" means to command a setpoint and "get" means to
/// return the stored setpoint. Whereas "read" means to query a measured value from the controller.
pub struct SpellmanPsu<
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
    const L: usize = 1024,
> {
    link: Link<S, L>,
    voltage: ChannelScaling,
    current: ChannelScaling,
    filament_current: ChannelScaling,
    setpoints: SetpointStore,
}

impl SpellmanPsu<TcpTransport> {
    /// Connect to the controller described by `config` and bring the device to [`DeviceState::Ready`].
    ///
    /// A failed connection is fatal: nothing is sent and the caller is expected to give up.
    pub fn initialize(config: &DeviceConfig) -> core::result::Result<Self, ConnectError> {
        info!(state = %DeviceState::Initializing, host = config.host.as_str(), port = config.port, "initialize device");

        let transport = TcpTransport::connect(&config.host, config.port, &config.link).inspect_err(|err| {
            tracing::error!(state = %DeviceState::Faulted, "error in initialize: {err}");
        })?;

        if !config.link.settle.is_zero() {
            std::thread::sleep(config.link.settle);
        }
        info!("connected to Spellman device at {}:{}", config.host, config.port);

        let link = Link::new(transport)
            .with_response_delay(config.link.response_delay)
            .with_read_timeout(config.link.read_timeout)
            .with_resync_idle(config.link.resync_idle);
        Ok(Self::with_link(link, config))
    }
}

impl<S, const L: usize> SpellmanPsu<S, L>
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    /// Create a SpellmanPsu over an already open interface.
    pub fn new(interface: S, config: &DeviceConfig) -> Self {
        Self::with_link(Link::new(interface), config)
    }

    /// Create a SpellmanPsu over an already framed link.
    pub fn with_link(link: Link<S, L>, config: &DeviceConfig) -> Self {
        info!(state = %DeviceState::Ready, "device ready");
        Self {
            link,
            voltage: config.scaling(Channel::Voltage),
            current: config.scaling(Channel::Current),
            filament_current: config.scaling(Channel::FilamentCurrent),
            setpoints: SetpointStore::new(),
        }
    }

    /// A constructed device is always [`DeviceState::Ready`].
    ///
    /// [`SpellmanPsu::initialize`] passes through `Initializing` and reports `Faulted` by returning an error,
    /// so neither is observable on a value. Link faults are per call and do not change the state.
    pub fn state(&self) -> DeviceState {
        DeviceState::Ready
    }

    pub fn scaling(&self, channel: Channel) -> &ChannelScaling {
        match channel {
            Channel::Voltage => &self.voltage,
            Channel::Current => &self.current,
            Channel::FilamentCurrent => &self.filament_current,
        }
    }

    /// Snapshot of the stored setpoints.
    pub fn setpoints(&self) -> SetpointStore {
        self.setpoints
    }

    /// Return the last acknowledged voltage setpoint in kV.
    pub fn get_voltage_setpoint(&self) -> f64 {
        self.setpoints.voltage()
    }

    /// Return the last acknowledged current setpoint in mA.
    pub fn get_current_setpoint(&self) -> f64 {
        self.setpoints.current()
    }

    /// Set the output voltage in kV.
    ///
    /// The stored setpoint becomes the value the DAC actually realizes, which may be slightly lower than requested.
    pub fn set_voltage(&mut self, kilovolts: f64) -> Result<f64, S::Error> {
        info!("set psu voltage setpoint to {kilovolts}kV");
        self.set_setpoint(Channel::Voltage, kilovolts)
    }

    /// Set the output current in mA.
    pub fn set_current(&mut self, milliamps: f64) -> Result<f64, S::Error> {
        info!("set psu current setpoint to {milliamps}mA");
        self.set_setpoint(Channel::Current, milliamps)
    }

    /// Command a setpoint and store it once the controller acknowledges.
    ///
    /// Returns the quantized value now stored. On any error nothing is stored and, unless the range check
    /// failed, nothing but the one command was sent.
    pub fn set_setpoint(&mut self, channel: Channel, value: f64) -> Result<f64, S::Error> {
        let Some(mnemonic) = channel.set_mnemonic() else {
            return Err(Error::ReadOnlyChannel(channel));
        };
        if !value.is_finite() {
            return Err(Error::InvalidSetpoint { channel, value });
        }

        let scaling = *self.scaling(channel);
        let code = scaling.to_code(value);
        if !scaling.code_in_range(code) {
            warn!(%channel, value, code, "DAC value {code} out of range");
            return Err(Error::RangeExceeded { channel, code });
        }
        let setpoint = scaling.quantized(code);

        let command = format!("{mnemonic} {code}");
        let response = self.link.query(&command)?;

        if response == ACK {
            self.setpoints.commit(channel, setpoint);
            Ok(setpoint)
        } else {
            warn!(%channel, command = command.as_str(), response = response.as_str(), "setpoint rejected");
            Err(Error::UnexpectedResponse { command, response })
        }
    }

    /// Return the measured output voltage in kV.
    pub fn read_voltage(&mut self) -> Result<f64, S::Error> {
        info!("get psu voltage readback");
        self.read_channel(Channel::Voltage)
    }

    /// Return the measured output current in mA.
    pub fn read_current(&mut self) -> Result<f64, S::Error> {
        info!("get psu current readback");
        self.read_channel(Channel::Current)
    }

    /// Return the measured filament current in mA.
    pub fn read_filament_current(&mut self) -> Result<f64, S::Error> {
        info!("get filament current readback");
        self.read_channel(Channel::FilamentCurrent)
    }

    /// Query a channel's ADC code and convert it to physical units.
    pub fn read_channel(&mut self, channel: Channel) -> Result<f64, S::Error> {
        let response = self.link.query(channel.query_mnemonic())?;
        let code = response
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|code| code.is_finite())
            .ok_or_else(|| Error::MalformedTelemetry {
                channel,
                response: response.clone(),
            })?;
        Ok(self.scaling(channel).to_value(code))
    }

    /// Read the interlock status.
    ///
    /// Every read that finds the interlock open zeroes both stored setpoints, even if they already are zero.
    /// Nothing is sent to the controller for this since it has already cut its output.
    pub fn read_interlock(&mut self) -> Result<InterlockStatus, S::Error> {
        info!("get interlock status");
        let response = self.link.query(CMD_INTERLOCK)?;
        let status = InterlockStatus::parse(&response);

        if status.is_tripped() {
            let before = self.setpoints.trip();
            warn!(
                voltage = before.voltage(),
                current = before.current(),
                "interlock open, setpoints reset to zero"
            );
        }
        Ok(status)
    }

    /// Enable the outputs.
    ///
    /// Both setpoints are first commanded to zero so the output always starts from a known safe value. If either
    /// fails the outputs stay off. Returns the controller's raw acknowledgement.
    pub fn enable(&mut self) -> Result<String, S::Error> {
        info!("enable DAC outputs");
        self.set_setpoint(Channel::Voltage, 0.0)?;
        self.set_setpoint(Channel::Current, 0.0)?;
        self.link.query(CMD_ON)
    }

    /// Disable the outputs. Returns the controller's raw acknowledgement.
    pub fn disable(&mut self) -> Result<String, S::Error> {
        info!("disable DAC outputs");
        self.link.query(CMD_OFF)
    }

    /// Return the identification string of the controller.
    pub fn identify(&mut self) -> Result<String, S::Error> {
        info!("send identification request");
        self.link.query(CMD_IDN)
    }

    #[cfg(test)]
    pub(crate) fn link(&self) -> &Link<S, L> {
        &self.link
    }

    #[cfg(test)]
    pub(crate) fn link_mut(&mut self) -> &mut Link<S, L> {
        &mut self.link
    }
}
