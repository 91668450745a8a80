//! Config loading and controller assembly for the CLI commands.

use std::fs;
use std::path::Path;

use eyre::WrapErr;
use tank_core::{ControllerCfg, TankController};
use tank_hardware::{
    FileStore, MemoryStore, ProbeFault, SimSettings, SimulatedTank, TracingRemoteLogger,
};
use tank_traits::clock::Clock;
use tank_traits::{KeypadSource, ProbeKind, RecordStore};

/// Comma-separated `probe:fault` pairs injected into the simulator,
/// e.g. `temperature:disconnected,ph:timeout`.
pub const SIM_FAULT_ENV: &str = "TANK_TEST_SIM_FAULT";

pub fn load_config(path: Option<&Path>) -> eyre::Result<tank_config::Config> {
    let cfg = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            tank_config::load_toml(&text)
                .wrap_err_with(|| format!("parse config {}", p.display()))?
        }
        None => tank_config::Config::default(),
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// The record store named by `[store] dir`, or a throwaway in-memory one.
pub fn open_store(cfg: &tank_config::Config) -> Box<dyn RecordStore> {
    match cfg.store.dir.as_deref() {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => {
            tracing::warn!("no [store] dir configured; settings are kept in memory only");
            Box::new(MemoryStore::new())
        }
    }
}

/// `[store] dir` as a file store, for commands that only make sense on disk.
pub fn require_file_store(cfg: &tank_config::Config) -> eyre::Result<FileStore> {
    cfg.store
        .dir
        .as_deref()
        .map(FileStore::new)
        .ok_or_else(|| eyre::eyre!("store.dir is not configured; nothing is persisted"))
}

fn parse_fault(s: &str) -> eyre::Result<(ProbeKind, ProbeFault)> {
    let (probe, fault) = s
        .split_once(':')
        .ok_or_else(|| eyre::eyre!("{SIM_FAULT_ENV}: expected probe:fault, got {s:?}"))?;
    let probe = match probe.trim() {
        "ph" => ProbeKind::Ph,
        "temperature" | "temp" => ProbeKind::Temperature,
        other => eyre::bail!("{SIM_FAULT_ENV}: unknown probe {other:?}"),
    };
    let fault = match fault.trim() {
        "disconnected" => ProbeFault::Disconnected,
        "timeout" => ProbeFault::Timeout,
        "garbage" => ProbeFault::Garbage,
        other => eyre::bail!("{SIM_FAULT_ENV}: unknown fault {other:?}"),
    };
    Ok((probe, fault))
}

pub fn sim_faults_from_env() -> eyre::Result<Vec<(ProbeKind, ProbeFault)>> {
    match std::env::var(SIM_FAULT_ENV) {
        Ok(v) => v
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(parse_fault)
            .collect(),
        Err(_) => Ok(Vec::new()),
    }
}

/// Simulated tank plus a controller wired to it.
pub fn build_simulated<C>(
    cfg: &tank_config::Config,
    clock: C,
    keypad: Option<Box<dyn KeypadSource>>,
    display: Option<Box<dyn tank_traits::Display>>,
) -> eyre::Result<(SimulatedTank, TankController)>
where
    C: Clock + Clone + Send + Sync + 'static,
{
    let tank = SimulatedTank::new(clock.clone(), SimSettings::default());
    for (probe, fault) in sim_faults_from_env()? {
        tracing::warn!(probe = probe.as_str(), ?fault, "injecting simulator fault");
        tank.set_fault(probe, Some(fault));
    }

    let mut builder = TankController::builder()
        .with_config(ControllerCfg::from(cfg))
        .with_clock(Box::new(clock))
        .with_store(open_store(cfg))
        .with_probes(tank.probes())
        .with_actuator(tank.relays())
        .with_logger(TracingRemoteLogger);
    if let Some(k) = keypad {
        builder = builder.with_keypad(k);
    }
    if let Some(d) = display {
        builder = builder.with_display(d);
    }
    let ctrl = builder.try_build()?;
    Ok((tank, ctrl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_pairs_parse() {
        assert_eq!(
            parse_fault("temp:garbage").unwrap(),
            (ProbeKind::Temperature, ProbeFault::Garbage)
        );
        assert!(parse_fault("ph").is_err());
        assert!(parse_fault("ph:melted").is_err());
    }
}
