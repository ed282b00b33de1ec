//! Device configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables prefixed with `SPELLMAN_`.
//! Nested keys are separated by a double underscore, e.g. `SPELLMAN_LINK__READ_TIMEOUT=3s`.
//!
//! ```toml
//! host = "192.168.1.40"
//! voltage_range = 30.0          # kV
//! current_range = 2.0           # mA
//! filament_current_range = 5.0  # mA
//!
//! [link]
//! read_timeout = "2s"
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scaling::ChannelScaling;
use crate::types::Channel;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "SPELLMAN_";

/// Static description of one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Controller host name or address.
    pub host: String,
    /// Controller TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Full output range in kV.
    pub voltage_range: f64,
    /// Full output range in mA.
    pub current_range: f64,
    /// Full filament current range in mA.
    pub filament_current_range: f64,
    #[serde(default = "default_dac_resolution")]
    pub dac_resolution: u32,
    #[serde(default = "default_adc_resolution")]
    pub adc_resolution: u32,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub link: LinkConfig,
}

/// Timing of the link to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Wait before reading each response; the controller is slow to turn around.
    #[serde(default = "default_response_delay", with = "humantime_serde")]
    pub response_delay: Duration,
    /// Hard deadline for one response frame.
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Pause after connecting before the first command.
    #[serde(default = "default_settle", with = "humantime_serde")]
    pub settle: Duration,
    /// After a failed exchange, input is discarded until the line has been idle this long.
    #[serde(default = "default_resync_idle", with = "humantime_serde")]
    pub resync_idle: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            response_delay: default_response_delay(),
            read_timeout: default_read_timeout(),
            connect_timeout: default_connect_timeout(),
            settle: default_settle(),
            resync_idle: default_resync_idle(),
        }
    }
}

fn default_port() -> u16 {
    23
}

fn default_dac_resolution() -> u32 {
    256
}

fn default_adc_resolution() -> u32 {
    1024
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_response_delay() -> Duration {
    Duration::from_millis(10)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_settle() -> Duration {
    Duration::from_secs(1)
}

fn default_resync_idle() -> Duration {
    Duration::from_secs(1)
}

impl DeviceConfig {
    /// Configuration with default resolutions and link timing.
    pub fn new(
        host: impl Into<String>,
        voltage_range: f64,
        current_range: f64,
        filament_current_range: f64,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            voltage_range,
            current_range,
            filament_current_range,
            dac_resolution: default_dac_resolution(),
            adc_resolution: default_adc_resolution(),
            log_level: default_log_level(),
            link: LinkConfig::default(),
        }
    }

    /// Load from `path` and the environment, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a device cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".into()));
        }

        for (name, range) in [
            ("voltage_range", self.voltage_range),
            ("current_range", self.current_range),
            ("filament_current_range", self.filament_current_range),
        ] {
            if !range.is_finite() || range <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {range}"
                )));
            }
        }

        if self.dac_resolution == 0 || self.adc_resolution == 0 {
            return Err(ConfigError::Invalid(
                "dac_resolution and adc_resolution must be non-zero".into(),
            ));
        }

        if self.link.read_timeout.is_zero() || self.link.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "read_timeout and connect_timeout must be non-zero".into(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Scaling parameters of a channel.
    pub fn scaling(&self, channel: Channel) -> ChannelScaling {
        let range = match channel {
            Channel::Voltage => self.voltage_range,
            Channel::Current => self.current_range,
            Channel::FilamentCurrent => self.filament_current_range,
        };
        ChannelScaling::new(range, self.dac_resolution, self.adc_resolution)
    }
}
