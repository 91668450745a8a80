//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;
use tank_traits::ProbeKind;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "tank", version, about = "Aquarium tank controller")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and print results as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProbeArg {
    Ph,
    Temperature,
}

impl From<ProbeArg> for ProbeKind {
    fn from(p: ProbeArg) -> Self {
        match p {
            ProbeArg::Ph => ProbeKind::Ph,
            ProbeArg::Temperature => ProbeKind::Temperature,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller against the simulated tank
    Run {
        /// Stop after this many scheduler passes (simulated time unless --realtime)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Scheduler period in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 100)]
        period_ms: u64,
        /// Key script fed to the keypad, e.g. "down down sel 7.2 sel"
        #[arg(long, value_name = "SCRIPT")]
        keys: Option<String>,
        /// Pace passes on the wall clock even with --ticks
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Fit a calibration from a CSV (raw,reference) and persist it
    Calibrate {
        #[arg(long, value_enum)]
        probe: ProbeArg,
        #[arg(long, value_name = "FILE")]
        csv: PathBuf,
    },
    /// Print persisted records
    Show,
    /// Validate config, store and a simulated control pass
    SelfCheck,
}
