#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod assemble;
mod cli;
mod error_fmt;
mod logging;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;
use tank_core::{CalibrationModel, PersistentStore, RecordId, TickOutcome};
use tank_traits::clock::MonotonicClock;
use tank_traits::clock::test_clock::TestClock;
use tank_traits::{Display, KeypadSource, ProbeKind, RecordStore};
use tank_ui::{ScriptedKeypad, TerminalDisplay, boxed_frame};

use crate::assemble::{build_simulated, load_config, require_file_store};
use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    logging::init_tracing(cli.json, &level, &cfg.logging)?;

    match cli.cmd {
        Commands::Run {
            ticks,
            period_ms,
            keys,
            realtime,
        } => cmd_run(&cfg, cli.json, ticks, period_ms, keys, realtime),
        Commands::Calibrate { probe, csv } => cmd_calibrate(&cfg, cli.json, probe.into(), &csv),
        Commands::Show => cmd_show(&cfg, cli.json),
        Commands::SelfCheck => cmd_self_check(&cfg, cli.json),
    }
}

fn cmd_run(
    cfg: &tank_config::Config,
    json: bool,
    ticks: Option<u64>,
    period_ms: u64,
    keys: Option<String>,
    realtime: bool,
) -> eyre::Result<()> {
    let keypad = keys
        .as_deref()
        .map(ScriptedKeypad::from_script)
        .transpose()
        .wrap_err("parse --keys")?
        .map(|k| Box::new(k) as Box<dyn KeypadSource>);
    let display = (!json)
        .then(|| Box::new(TerminalDisplay::stdout(cfg.display.line_width)) as Box<dyn Display>);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .wrap_err("install Ctrl-C handler")?;
    }

    // without a pass limit only the wall clock makes sense
    let (tank, mut ctrl) = if realtime || ticks.is_none() {
        build_simulated(cfg, MonotonicClock::new(), keypad, display)?
    } else {
        build_simulated(cfg, TestClock::new(), keypad, display)?
    };
    let passes = ctrl.run(
        Duration::from_millis(period_ms),
        ticks,
        &|| stop.load(Ordering::SeqCst),
    );

    let ctx = ctrl.context();
    if json {
        let out = json!({
            "ticks": passes,
            "uptime_ms": ctrl.now(),
            "menu": format!("{:?}", ctrl.menu().current()),
            "temperature_c": ctx.value(ProbeKind::Temperature),
            "ph": ctx.value(ProbeKind::Ph),
            "temperature_setpoint_c": ctx.setpoint(ProbeKind::Temperature),
            "ph_setpoint": ctx.setpoint(ProbeKind::Ph),
            "dose_mode": ctx.dose_mode().label(),
            "frame": ctrl.frame(),
            "sim": {
                "temperature_c": tank.temperature_c(),
                "ph": tank.ph(),
                "thermal_overlap": tank.thermal_overlap_seen(),
            },
        });
        println!("{out}");
    } else {
        println!(
            "ran {passes} passes ({})",
            tank_core::menu::format_uptime(ctrl.now())
        );
        println!("{}", boxed_frame(&ctrl.frame(), cfg.display.line_width));
    }
    Ok(())
}

fn cmd_calibrate(
    cfg: &tank_config::Config,
    json: bool,
    probe: ProbeKind,
    csv: &Path,
) -> eyre::Result<()> {
    let rows = tank_config::load_calibration_csv(csv)?;
    let model = CalibrationModel::try_from(rows.as_slice())?;
    let mut store = require_file_store(cfg)?;
    store.put(RecordId::calibration(probe), &model)?;
    tracing::info!(
        probe = probe.as_str(),
        points = rows.len(),
        slope = model.slope,
        intercept = model.intercept,
        "calibration imported"
    );
    if json {
        println!(
            "{}",
            json!({
                "probe": probe.as_str(),
                "points": rows.len(),
                "slope": model.slope,
                "intercept": model.intercept,
            })
        );
    } else {
        println!(
            "{probe} calibration saved: slope={:.6} intercept={:.6} ({} points)",
            model.slope,
            model.intercept,
            rows.len()
        );
    }
    Ok(())
}

fn cmd_show(cfg: &tank_config::Config, json: bool) -> eyre::Result<()> {
    let store = require_file_store(cfg)?;
    let mut records = serde_json::Map::new();
    for id in RecordId::ALL {
        let raw = store
            .load(id.key())
            .map_err(|e| eyre::eyre!("read record {}: {e}", id.key()))?;
        if json {
            let value = raw.map_or(serde_json::Value::Null, |s| {
                serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
            });
            records.insert(id.key().to_string(), value);
        } else {
            println!("{} = {}", id.key(), raw.as_deref().unwrap_or("(unset)"));
        }
    }
    if json {
        println!("{}", serde_json::Value::Object(records));
    }
    Ok(())
}

fn cmd_self_check(cfg: &tank_config::Config, json: bool) -> eyre::Result<()> {
    if let Some(dir) = cfg.store.dir.as_deref() {
        std::fs::create_dir_all(dir).wrap_err_with(|| format!("create store dir {dir}"))?;
    }

    #[cfg(feature = "hardware")]
    {
        let hw = &cfg.hardware;
        if hw.heater_pin.is_some() || hw.chiller_pin.is_some() || hw.dose_pin.is_some() {
            tank_hardware::GpioRelays::new(hw.heater_pin, hw.chiller_pin, hw.dose_pin)
                .wrap_err("open relay pins")?;
        }
    }

    let (_tank, mut ctrl) = build_simulated(cfg, TestClock::new(), None, None)?;
    let report = ctrl.tick();
    ctrl.shutdown();
    for (probe, outcome) in [
        (ProbeKind::Temperature, &report.temperature),
        (ProbeKind::Ph, &report.ph),
    ] {
        if let TickOutcome::FailSafe(e) = outcome {
            return Err(eyre::Report::new(e.clone()).wrap_err(format!("{probe} probe check failed")));
        }
    }

    let ctx = ctrl.context();
    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "tank_id": ctx.tank_id,
                "temperature_c": ctx.value(ProbeKind::Temperature),
                "ph": ctx.value(ProbeKind::Ph),
            })
        );
    } else {
        println!("self-check OK (tank {})", ctx.tank_id);
    }
    Ok(())
}
