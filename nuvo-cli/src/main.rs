//! Nuvo amplifier command-line control
//!
//! Queries and changes zones on a Nuvo Concerto or Simplese amplifier over
//! a serial port, or against a simulated amplifier with `--simulate`.
//! Status snapshots print as JSON and can be fed back to `restore`.

mod settings;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use nuvo_control::ZoneController;
use nuvo_protocol::{NuvoCommand, Transport, ZoneStatus};
use nuvo_sim::VirtualAmplifier;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use settings::{ConnectionType, Settings};

const LOG_TARGETS: [&str; 4] = ["nuvoctl", "nuvo_protocol", "nuvo_control", "nuvo_sim"];

#[derive(Parser, Debug)]
#[command(name = "nuvoctl", version, about = "Control Nuvo multi-zone amplifiers")]
struct Cli {
    /// Serial port (overrides the settings file)
    #[arg(long, value_name = "PORT", global = true, conflicts_with = "simulate")]
    port: Option<String>,

    /// Talk to a simulated amplifier instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    /// Settings file (default: $XDG_CONFIG_HOME/nuvo/settings.json)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Minimum log level for all nuvo crates (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print zone status as JSON
    Status {
        #[arg(required = true, value_name = "ZONE")]
        zones: Vec<u8>,
    },
    /// Turn a zone on or off
    Power { zone: u8, state: Switch },
    /// Mute or unmute a zone
    Mute { zone: u8, state: Switch },
    /// Set volume in dB (-78 to 0; the sign is optional)
    Volume {
        zone: u8,
        #[arg(allow_hyphen_values = true)]
        level: String,
    },
    /// Set treble (-12 to 12)
    Treble {
        zone: u8,
        #[arg(allow_hyphen_values = true)]
        level: i32,
    },
    /// Set bass (-12 to 12)
    Bass {
        zone: u8,
        #[arg(allow_hyphen_values = true)]
        level: i32,
    },
    /// Select a source (1 to 6)
    Source { zone: u8, source: i32 },
    /// Re-apply zone snapshots written by `status`
    Restore { file: PathBuf },
    /// Write the effective settings to the settings file
    SaveConfig,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// One snapshot or a list of them, as printed by `status`
#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshots {
    One(ZoneStatus),
    Many(Vec<ZoneStatus>),
}

impl Snapshots {
    fn into_vec(self) -> Vec<ZoneStatus> {
        match self {
            Snapshots::One(status) => vec![status],
            Snapshots::Many(list) => list,
        }
    }
}

fn filter_for(level: Option<LogLevel>) -> EnvFilter {
    let directives = |level: &str| {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    };

    match level {
        Some(level) => EnvFilter::new(directives(level.directive())),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| directives("info").into()),
    }
}

fn init_logging(level: Option<LogLevel>) {
    // stdout carries JSON output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let settings_path = cli.config.clone().or_else(Settings::settings_path);
    let mut settings = settings_path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();

    if let Some(port) = cli.port {
        settings.connection_type = ConnectionType::Serial;
        settings.port = port;
    }
    if cli.simulate {
        settings.connection_type = ConnectionType::Simulated;
    }

    if let Command::SaveConfig = cli.command {
        let path = settings_path.context("could not determine settings path")?;
        settings.save_to(&path)?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = settings.controller_config();
    match settings.connection_type {
        ConnectionType::Simulated => {
            info!("Using simulated amplifier {:?}", settings.simulator.id);
            let amp = VirtualAmplifier::from_config(settings.simulator.clone());
            run(&ZoneController::with_config(amp, config), cli.command)
        }
        ConnectionType::Serial => {
            if settings.port.is_empty() {
                bail!("no serial port configured; pass --port or --simulate");
            }
            let nuvo = ZoneController::open(&settings.serial_settings(), config)?;
            run(&nuvo, cli.command)
        }
    }
}

fn run<T: Transport>(nuvo: &ZoneController<T>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Status { zones } => {
            let mut snapshots = Vec::with_capacity(zones.len());
            for zone in zones {
                let status = nuvo
                    .zone_status(zone)
                    .with_context(|| format!("no status from zone {zone}"))?;
                snapshots.push(status);
            }
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
        Command::Power { zone, state } => nuvo.set_power(zone, state.is_on()),
        Command::Mute { zone, state } => nuvo.set_mute(zone, state.is_on()),
        Command::Volume { zone, level } => nuvo.execute(NuvoCommand::volume_token(zone, &level)),
        Command::Treble { zone, level } => nuvo.set_treble(zone, level),
        Command::Bass { zone, level } => nuvo.set_bass(zone, level),
        Command::Source { zone, source } => nuvo.set_source(zone, source),
        Command::Restore { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let snapshots: Snapshots = serde_json::from_str(&json)
                .with_context(|| format!("{} is not a zone snapshot", file.display()))?;
            for status in snapshots.into_vec() {
                nuvo.restore_zone(&status);
            }
        }
        Command::SaveConfig => bail!("save-config does not talk to an amplifier"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_status_with_several_zones() {
        let cli = Cli::try_parse_from(["nuvoctl", "status", "1", "2", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Status { ref zones } if zones == &[1, 2, 7]));
    }

    #[test]
    fn test_status_requires_a_zone() {
        let err = Cli::try_parse_from(["nuvoctl", "status"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_parses_negative_volume_token() {
        let cli = Cli::try_parse_from(["nuvoctl", "volume", "3", "-45.7"]).unwrap();
        match cli.command {
            Command::Volume { zone, level } => {
                assert_eq!(zone, 3);
                assert_eq!(NuvoCommand::volume_token(zone, &level).body(), "Z03VOL46");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parses_negative_treble() {
        let cli = Cli::try_parse_from(["nuvoctl", "treble", "2", "-5"]).unwrap();
        assert!(matches!(cli.command, Command::Treble { zone: 2, level: -5 }));
    }

    #[test]
    fn test_parses_power_switch_and_global_flags() {
        let cli = Cli::try_parse_from([
            "nuvoctl",
            "power",
            "1",
            "on",
            "--simulate",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert!(cli.simulate);
        assert!(matches!(cli.log_level, Some(LogLevel::Debug)));
        assert!(matches!(
            cli.command,
            Command::Power {
                zone: 1,
                state: Switch::On
            }
        ));
    }

    #[test]
    fn test_port_conflicts_with_simulate() {
        let err = Cli::try_parse_from(["nuvoctl", "--port", "COM3", "--simulate", "status", "1"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_snapshots_accept_one_or_many() {
        let one = r#"{"zone":1,"power":true,"source":"2","mute":false,"volume":-30,"treble":0,"bass":0}"#;
        let many = format!("[{one},{one}]");

        let parsed: Snapshots = serde_json::from_str(one).unwrap();
        assert_eq!(parsed.into_vec().len(), 1);
        let parsed: Snapshots = serde_json::from_str(&many).unwrap();
        assert_eq!(parsed.into_vec().len(), 2);
    }

    #[test]
    fn test_run_against_simulator() {
        let nuvo = ZoneController::new(VirtualAmplifier::default());

        run(&nuvo, Command::Power { zone: 2, state: Switch::On }).unwrap();
        run(
            &nuvo,
            Command::Volume {
                zone: 2,
                level: "abc".to_string(),
            },
        )
        .unwrap();

        let status = nuvo.zone_status(2).unwrap();
        assert!(status.power);
        assert_eq!(status.volume, -40);
        assert!(run(&nuvo, Command::Status { zones: vec![2] }).is_ok());
    }
}
