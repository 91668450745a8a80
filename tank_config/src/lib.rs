#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration CSV parsing for the tank controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a valid config.
//! - The calibration CSV loader enforces headers; fitting happens in
//!   `tank_core`, which owns the regression.
use serde::Deserialize;
use std::path::Path;

/// Calibration CSV schema.
///
/// Expected headers:
/// raw,reference
///
/// Example (pH probe, millivolt-like raw counts):
/// raw,reference
/// 3000,4.0
/// 2000,7.0
/// 1000,10.0
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CalibrationRow {
    pub raw: f64,
    pub reference: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Tank {
    /// Identifier reported to the remote logger (1..=99).
    pub id: u16,
}

impl Default for Tank {
    fn default() -> Self {
        Self { id: 1 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
    /// Characters per LCD line.
    pub line_width: usize,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self { line_width: 16 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MenuCfg {
    /// Return to the main menu after this long without a key press.
    /// 0 disables the timeout.
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_min: f64,
    pub output_max: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThermalDevices {
    Heater,
    Chiller,
    #[default]
    Both,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelayCfg {
    /// |PID output| below this is treated as "no demand".
    pub threshold: f64,
    /// Time-proportioning window for the relay.
    pub period_ms: u64,
    /// Shortest on-pulse worth switching the relay for.
    pub min_on_ms: u64,
    pub heater_min_off_ms: u64,
    /// Compressors need a longer rest between cycles.
    pub chiller_min_off_ms: u64,
}

impl Default for RelayCfg {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            period_ms: 10_000,
            min_on_ms: 1_000,
            heater_min_off_ms: 1_000,
            chiller_min_off_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TemperatureCfg {
    pub setpoint_c: f64,
    pub min_c: f64,
    pub max_c: f64,
    pub tick_ms: u64,
    /// Readings older than this force the thermal outputs off.
    pub stale_ms: u64,
    /// Moving-average window over calibrated readings (1 = disabled).
    pub smoothing_window: usize,
    pub devices: ThermalDevices,
    pub pid: PidCfg,
    pub relay: RelayCfg,
}

impl Default for TemperatureCfg {
    fn default() -> Self {
        Self {
            setpoint_c: 25.0,
            min_c: 0.0,
            max_c: 50.0,
            tick_ms: 1_000,
            stale_ms: 5_000,
            smoothing_window: 10,
            devices: ThermalDevices::Both,
            pid: PidCfg {
                kp: 10.0,
                ki: 0.1,
                kd: 0.0,
                output_min: -100.0,
                output_max: 100.0,
            },
            relay: RelayCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DoseDirection {
    /// Dosing lowers pH (CO2 injection).
    #[default]
    Lower,
    /// Dosing raises pH (alkaline reagent).
    Raise,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DoseModeCfg {
    /// PID-sized pulses inside each control period.
    #[default]
    Pulse,
    /// On whenever pH is beyond the setpoint, still capped per period.
    Continuous,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DoseCfg {
    pub period_ms: u64,
    /// Hard cap on the on-time within one period.
    pub max_dose_ms: u64,
    pub min_off_ms: u64,
    pub threshold: f64,
    pub direction: DoseDirection,
    pub mode: DoseModeCfg,
}

impl Default for DoseCfg {
    fn default() -> Self {
        Self {
            period_ms: 10_000,
            max_dose_ms: 5_000,
            min_off_ms: 1_000,
            threshold: 1.0,
            direction: DoseDirection::Lower,
            mode: DoseModeCfg::Pulse,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PhCfg {
    pub setpoint: f64,
    pub min: f64,
    pub max: f64,
    pub tick_ms: u64,
    pub stale_ms: u64,
    pub pid: PidCfg,
    pub dose: DoseCfg,
}

impl Default for PhCfg {
    fn default() -> Self {
        Self {
            setpoint: 7.0,
            min: 0.0,
            max: 14.0,
            tick_ms: 1_000,
            stale_ms: 5_000,
            pid: PidCfg {
                kp: 100.0,
                ki: 0.5,
                kd: 0.0,
                output_min: -100.0,
                output_max: 100.0,
            },
            dose: DoseCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// Minutes between remote log records.
    pub interval_min: u32,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            file: None,
            level: None,
            rotation: None,
            interval_min: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time a probe read may take before it counts as failed.
    pub sensor_read_timeout_ms: u64,
    pub heater_pin: Option<u8>,
    pub chiller_pin: Option<u8>,
    pub dose_pin: Option<u8>,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
            heater_pin: None,
            chiller_pin: None,
            dose_pin: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StoreCfg {
    /// Directory holding one file per record. Absent keeps records in memory.
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tank: Tank,
    pub display: DisplayCfg,
    pub menu: MenuCfg,
    pub temperature: TemperatureCfg,
    pub ph: PhCfg,
    pub logging: Logging,
    pub hardware: Hardware,
    pub store: StoreCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read calibration rows from any CSV source with strict `raw,reference` headers.
pub fn read_calibration_csv<R: std::io::Read>(reader: R) -> eyre::Result<Vec<CalibrationRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {e}"))?
        .clone();
    let expected = ["raw", "reference"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'raw,reference', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.len() < 2 {
        eyre::bail!("calibration requires at least two rows, got {}", rows.len());
    }
    Ok(rows)
}

pub fn load_calibration_csv(path: &Path) -> eyre::Result<Vec<CalibrationRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;
    read_calibration_csv(file).map_err(|e| eyre::eyre!("{:?}: {e}", path))
}

fn validate_pid(section: &str, pid: &PidCfg) -> eyre::Result<()> {
    for (name, v) in [("kp", pid.kp), ("ki", pid.ki), ("kd", pid.kd)] {
        if !v.is_finite() || v < 0.0 {
            eyre::bail!("{section}.pid.{name} must be finite and >= 0");
        }
    }
    if !(pid.output_min.is_finite() && pid.output_max.is_finite()) {
        eyre::bail!("{section}.pid output limits must be finite");
    }
    if pid.output_min >= pid.output_max {
        eyre::bail!("{section}.pid.output_min must be < output_max");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Tank
        if !(1..=99).contains(&self.tank.id) {
            eyre::bail!("tank.id must be in 1..=99");
        }

        // Display
        if self.display.line_width < 8 {
            eyre::bail!("display.line_width must be >= 8");
        }

        // Menu
        if self.menu.idle_timeout_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("menu.idle_timeout_ms is unreasonably large (>24h)");
        }

        // Temperature
        let t = &self.temperature;
        if t.min_c >= t.max_c {
            eyre::bail!("temperature.min_c must be < temperature.max_c");
        }
        if !(t.min_c..=t.max_c).contains(&t.setpoint_c) {
            eyre::bail!("temperature.setpoint_c must be within [min_c, max_c]");
        }
        if t.tick_ms == 0 {
            eyre::bail!("temperature.tick_ms must be >= 1");
        }
        if t.stale_ms < t.tick_ms {
            eyre::bail!("temperature.stale_ms must be >= temperature.tick_ms");
        }
        if t.smoothing_window == 0 {
            eyre::bail!("temperature.smoothing_window must be >= 1");
        }
        validate_pid("temperature", &t.pid)?;
        if t.relay.threshold < 0.0 {
            eyre::bail!("temperature.relay.threshold must be >= 0");
        }
        if t.relay.period_ms == 0 {
            eyre::bail!("temperature.relay.period_ms must be >= 1");
        }
        if t.relay.min_on_ms > t.relay.period_ms {
            eyre::bail!("temperature.relay.min_on_ms must be <= period_ms");
        }

        // pH
        let p = &self.ph;
        if p.min >= p.max {
            eyre::bail!("ph.min must be < ph.max");
        }
        if !(p.min..=p.max).contains(&p.setpoint) {
            eyre::bail!("ph.setpoint must be within [min, max]");
        }
        if p.tick_ms == 0 {
            eyre::bail!("ph.tick_ms must be >= 1");
        }
        if p.stale_ms < p.tick_ms {
            eyre::bail!("ph.stale_ms must be >= ph.tick_ms");
        }
        validate_pid("ph", &p.pid)?;
        if p.dose.period_ms == 0 {
            eyre::bail!("ph.dose.period_ms must be >= 1");
        }
        if p.dose.max_dose_ms == 0 || p.dose.max_dose_ms > p.dose.period_ms {
            eyre::bail!("ph.dose.max_dose_ms must be in 1..=period_ms");
        }
        if p.dose.threshold < 0.0 {
            eyre::bail!("ph.dose.threshold must be >= 0");
        }

        // Logging
        if !(1..=1440).contains(&self.logging.interval_min) {
            eyre::bail!("logging.interval_min must be in 1..=1440");
        }
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        Ok(())
    }
}
