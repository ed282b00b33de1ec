//! This crate provides an interface for controlling a Spellman high-voltage power supply controller.
//!
//! The controller speaks a line-based ASCII protocol over TCP (port 23 by default). Every frame is terminated by a
//! line feed and only one request may be outstanding at a time.
//!
//! | Command    | Meaning                           | Response        |
//! |------------|-----------------------------------|-----------------|
//! | `:V <n>`   | set voltage DAC code              | `OK`            |
//! | `:C <n>`   | set current DAC code              | `OK`            |
//! | `:V?`      | query voltage ADC code            | number          |
//! | `:C?`      | query current ADC code            | number          |
//! | `:FIL?`    | query filament current ADC code   | number          |
//! | `:ILOCK?`  | query interlock status            | `open`/`closed` |
//! | `:ON`/`:OFF` | enable/disable output           | acknowledgement |
//! | `*IDN?`    | identification                    | text            |
//!
//! Physical values are in kV for voltage and mA for currents. Setpoints are converted with the DAC resolution
//! (256 codes by default) and always rounded down; readbacks use the ADC resolution (1024 codes by default).
//!
//! ```no_run
//! use spellman_hv::{config::DeviceConfig, psu::SpellmanPsu};
//!
//! let config = DeviceConfig::load_from("spellman.toml")?;
//! let mut psu = SpellmanPsu::initialize(&config)?;
//! psu.enable()?;
//! psu.set_voltage(5.0)?;
//! println!("{} kV", psu.read_voltage()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod psu;
pub mod scaling;
pub mod service;
pub mod setpoint;
pub mod tcp;
pub mod types;

#[cfg(test)]
mod mock_serial;
