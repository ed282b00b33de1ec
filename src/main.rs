//! Command line front-end for a Spellman controller.
//!
//! ```bash
//! spellman-hv --config spellman.toml status
//! spellman-hv --config spellman.toml set-voltage 5.0
//! spellman-hv --config spellman.toml monitor --interval 500ms --count 20
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spellman_hv::{
    config::DeviceConfig, psu::SpellmanPsu, service::SharedPsu, tcp::TcpTransport, types::Channel,
};
use strum::IntoEnumIterator;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spellman-hv")]
#[command(about = "Control a Spellman high-voltage supply over TCP", long_about = None)]
struct Cli {
    /// Device configuration file (TOML format)
    #[arg(long, default_value = "spellman.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the controller identification
    Idn,
    /// Print readbacks, stored setpoints and the interlock status
    Status,
    /// Set the output voltage in kV
    SetVoltage { kilovolts: f64 },
    /// Set the output current in mA
    SetCurrent { milliamps: f64 },
    /// Zero both setpoints and enable the outputs
    Enable,
    /// Disable the outputs
    Disable,
    /// Print the interlock status
    Interlock,
    /// Poll readbacks and interlock periodically
    Monitor {
        /// Time between polls
        #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
        interval: Duration,
        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match DeviceConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    // Without a connection there is nothing to do.
    let psu = match SpellmanPsu::initialize(&config) {
        Ok(psu) => SharedPsu::new(psu),
        Err(err) => {
            error!("could not connect to {}:{}: {err}", config.host, config.port);
            return ExitCode::FAILURE;
        }
    };

    match run(&psu, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(psu: &SharedPsu<TcpTransport>, command: Commands) -> Result<()> {
    match command {
        Commands::Idn => println!("{}", psu.identify()?),
        Commands::Status => print_status(psu)?,
        Commands::SetVoltage { kilovolts } => {
            let stored = psu.set_voltage(kilovolts)?;
            println!("voltage setpoint {stored} kV");
        }
        Commands::SetCurrent { milliamps } => {
            let stored = psu.set_current(milliamps)?;
            println!("current setpoint {stored} mA");
        }
        Commands::Enable => println!("{}", psu.enable()?),
        Commands::Disable => println!("{}", psu.disable()?),
        Commands::Interlock => println!("{}", psu.read_interlock()?),
        Commands::Monitor { interval, count } => {
            info!(?interval, "monitoring");
            let mut polls = 0;
            loop {
                print_status(psu)?;
                polls += 1;
                if count.is_some_and(|count| polls >= count) {
                    break;
                }
                std::thread::sleep(interval);
            }
        }
    }
    Ok(())
}

fn print_status(psu: &SharedPsu<TcpTransport>) -> Result<()> {
    for channel in Channel::iter() {
        let value = psu
            .read_channel(channel)
            .with_context(|| format!("reading {channel}"))?;
        println!("{channel}: {value:.4} {}", channel.unit());
    }
    let interlock = psu.read_interlock().context("reading interlock")?;
    let setpoints = psu.setpoints();
    println!(
        "Setpoints: {:.4} kV, {:.4} mA",
        setpoints.voltage(),
        setpoints.current()
    );
    println!("Interlock: {interlock}");
    Ok(())
}
