//! Keypad-driven menu state machine.
//!
//! One current node at a time. Keys go to the current node's handler, chosen
//! by its [`NodeKind`]; transitions always land on a node of the static table
//! in [`table`], so the operator can always get back to `MainMenu` with Back.

pub mod entry;
pub mod table;

use tank_traits::{Channel, KeyEvent, ProbeKind};

use crate::Timestamp;
use crate::context::{Gain, LOG_INTERVAL_RANGE, TANK_ID_RANGE, TankContext};
use crate::policy::{ActuatorPolicy, PolicyPhase};
use crate::wizard::WizardState;
use entry::{EntryOutcome, NumberFormat, NumericEntryState};
use table::{ActionKind, EntryField, MenuId, NodeKind, ROOT_ITEMS, SeeField};

/// Largest gain the keypad can enter.
pub const MAX_GAIN: f64 = 999_999.9;

/// Menu settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuCfg {
    pub line_width: usize,
    /// 0 disables the idle return to `MainMenu`.
    pub idle_timeout_ms: u64,
}

pub struct MenuStateMachine {
    current: MenuId,
    cursor: usize,
    entry: Option<NumericEntryState<TankContext>>,
    /// Second-line message after a failed action.
    notice: Option<String>,
    last_key_at: Timestamp,
    cfg: MenuCfg,
}

impl MenuStateMachine {
    pub fn new(cfg: MenuCfg) -> Self {
        Self {
            current: MenuId::MainMenu,
            cursor: 0,
            entry: None,
            notice: None,
            last_key_at: 0,
            cfg,
        }
    }

    pub fn current(&self) -> MenuId {
        self.current
    }

    /// Root item under the cursor.
    pub fn highlighted(&self) -> MenuId {
        ROOT_ITEMS[self.cursor]
    }

    pub fn entry(&self) -> Option<&NumericEntryState<TankContext>> {
        self.entry.as_ref()
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &mut TankContext, now: Timestamp) {
        self.last_key_at = now;
        ctx.now = now;
        match self.current.kind() {
            NodeKind::Menu => self.main_menu_key(key, ctx),
            NodeKind::Entry(_) | NodeKind::CalibrationPoint { .. } => self.entry_key(key, ctx),
            NodeKind::CalibrationSave(_) => self.save_key(key, ctx),
            NodeKind::Action(action) => self.action_key(action, key, ctx),
            NodeKind::See(_) => {
                if key == KeyEvent::Back {
                    self.go(MenuId::MainMenu, ctx);
                }
            }
        }
    }

    /// Idle timeout. Never leaves numeric entry or a running calibration.
    /// Returns true when it moved the menu.
    pub fn tick(&mut self, now: Timestamp, ctx: &mut TankContext) -> bool {
        if self.cfg.idle_timeout_ms == 0
            || self.current == MenuId::MainMenu
            || self.entry.is_some()
            || ctx.wizard.is_active()
        {
            return false;
        }
        if now.saturating_sub(self.last_key_at) < self.cfg.idle_timeout_ms {
            return false;
        }
        tracing::debug!(node = ?self.current, "idle timeout");
        self.go(MenuId::MainMenu, ctx);
        true
    }

    fn main_menu_key(&mut self, key: KeyEvent, ctx: &mut TankContext) {
        let n = ROOT_ITEMS.len();
        match key {
            KeyEvent::Up => self.cursor = (self.cursor + n - 1) % n,
            KeyEvent::Down => self.cursor = (self.cursor + 1) % n,
            KeyEvent::Select => self.go(ROOT_ITEMS[self.cursor], ctx),
            _ => {}
        }
    }

    fn entry_key(&mut self, key: KeyEvent, ctx: &mut TankContext) {
        let Some(entry) = self.entry.as_mut() else {
            // entry nodes always carry an entry; recover to the root
            self.go(MenuId::MainMenu, ctx);
            return;
        };
        match entry.handle_key(key, ctx) {
            EntryOutcome::Editing | EntryOutcome::Rejected(_) => {}
            EntryOutcome::Committed(v) => {
                tracing::info!(node = ?self.current, value = v, "value committed");
                let next = match self.current.kind() {
                    NodeKind::CalibrationPoint { probe, .. } => next_calibration_node(probe, ctx),
                    _ => MenuId::MainMenu,
                };
                self.go(next, ctx);
            }
            EntryOutcome::Cancelled => {
                if matches!(self.current.kind(), NodeKind::CalibrationPoint { .. }) {
                    ctx.abort_calibration();
                }
                self.go(MenuId::MainMenu, ctx);
            }
        }
    }

    fn save_key(&mut self, key: KeyEvent, ctx: &mut TankContext) {
        match (ctx.wizard.state(), key) {
            (WizardState::Confirming, KeyEvent::Select) => {
                // outcome is also rendered from the wizard state
                if let Err(e) = ctx.confirm_calibration() {
                    tracing::warn!(node = ?self.current, error = %e, "calibration not saved");
                }
            }
            (WizardState::Confirming, KeyEvent::Back) => {
                ctx.abort_calibration();
                self.go(MenuId::MainMenu, ctx);
            }
            (WizardState::Confirming, _) => {}
            (_, KeyEvent::Select | KeyEvent::Back) => self.go(MenuId::MainMenu, ctx),
            _ => {}
        }
    }

    fn action_key(&mut self, action: ActionKind, key: KeyEvent, ctx: &mut TankContext) {
        match key {
            KeyEvent::Select => {
                let result = match action {
                    ActionKind::ClearCalibration(probe) => ctx.clear_calibration(probe),
                    ActionKind::ToggleDoseMode => ctx.toggle_dose_mode().map(|_| ()),
                };
                match result {
                    Ok(()) => self.go(MenuId::MainMenu, ctx),
                    Err(e) => self.notice = Some(e.to_string()),
                }
            }
            KeyEvent::Back => self.go(MenuId::MainMenu, ctx),
            _ => {}
        }
    }

    fn go(&mut self, next: MenuId, ctx: &mut TankContext) {
        tracing::debug!(from = ?self.current, to = ?next, "menu transition");
        self.current = next;
        self.notice = None;
        self.entry = None;
        match next.kind() {
            NodeKind::Entry(field) => self.entry = Some(entry_for(field, ctx)),
            NodeKind::CalibrationPoint {
                probe,
                index,
                prompt,
            } => {
                if index == 0
                    && ctx.wizard.active_session() != Some(probe)
                    && let Err(e) = ctx.begin_calibration(probe)
                {
                    tracing::warn!(probe = probe.as_str(), error = %e, "cannot start calibration");
                    self.current = MenuId::MainMenu;
                    return;
                }
                self.entry = Some(calibration_entry(probe, prompt));
            }
            _ => {}
        }
    }

    /// Two display lines, each cut to the configured width.
    pub fn render(&self, ctx: &TankContext, now: Timestamp) -> String {
        let (l1, l2) = self.lines(ctx, now);
        let w = self.cfg.line_width;
        format!("{}\n{}", fit_line(&l1, w), fit_line(&l2, w))
    }

    fn lines(&self, ctx: &TankContext, now: Timestamp) -> (String, String) {
        match self.current.kind() {
            NodeKind::Menu => (
                format!(
                    "{} pH {}",
                    fmt_opt(ctx.value(ProbeKind::Temperature), 2, "C"),
                    fmt_opt(ctx.value(ProbeKind::Ph), 3, "")
                ),
                format!("> {}", self.highlighted().label()),
            ),
            NodeKind::Entry(_) => self.entry_lines(None),
            NodeKind::CalibrationPoint { probe, .. } => {
                let raw = match probe {
                    ProbeKind::Ph => ctx.ph.fresh_raw(now),
                    ProbeKind::Temperature => ctx.temperature.fresh_raw(now),
                };
                self.entry_lines(Some(raw))
            }
            NodeKind::CalibrationSave(probe) => save_lines(probe, ctx),
            NodeKind::Action(action) => {
                let title = match action {
                    ActionKind::ClearCalibration(p) => format!("Clear {} cal?", probe_name(p)),
                    ActionKind::ToggleDoseMode => format!("Now {}", ctx.dose_mode().label()),
                };
                let hint = match action {
                    ActionKind::ClearCalibration(_) => "Sel=yes Back=no",
                    ActionKind::ToggleDoseMode => "Sel=toggle",
                };
                (title, self.notice.clone().unwrap_or_else(|| hint.to_string()))
            }
            NodeKind::See(field) => see_lines(field, ctx, now),
        }
    }

    fn entry_lines(&self, raw: Option<Option<f64>>) -> (String, String) {
        let Some(e) = self.entry.as_ref() else {
            return (self.current.label().to_string(), String::new());
        };
        let second = match (e.error(), raw) {
            (Some(err), _) => err.to_string(),
            (None, Some(raw)) if e.buffer().is_empty() => match raw {
                Some(v) => format!("raw {v:.1}"),
                None => "no reading".to_string(),
            },
            (None, _) => e.buffer().to_string(),
        };
        (e.prompt().to_string(), second)
    }
}

fn next_calibration_node(probe: ProbeKind, ctx: &TankContext) -> MenuId {
    match ctx.wizard.state() {
        WizardState::AwaitingPoint(i) => {
            MenuId::calibration_step(probe, i).unwrap_or(MenuId::MainMenu)
        }
        WizardState::Confirming => MenuId::calibration_save(probe),
        _ => MenuId::MainMenu,
    }
}

fn entry_for(field: EntryField, ctx: &TankContext) -> NumericEntryState<TankContext> {
    use ProbeKind::{Ph, Temperature};
    match field {
        EntryField::Setpoint(probe) => {
            let (min, max) = ctx.setpoint_range(probe);
            match probe {
                Ph => NumericEntryState::new(
                    "Set pH",
                    NumberFormat::Decimal { places: 3 },
                    min,
                    max,
                    |c: &mut TankContext, v| c.commit_setpoint(Ph, v),
                ),
                Temperature => NumericEntryState::new(
                    "Set Temp in C",
                    NumberFormat::Decimal { places: 2 },
                    min,
                    max,
                    |c: &mut TankContext, v| c.commit_setpoint(Temperature, v),
                ),
            }
        }
        EntryField::Gain(probe, gain) => {
            let (prompt, commit): (&'static str, entry::CommitFn<TankContext>) = match (probe, gain) {
                (Ph, Gain::Kp) => ("Set KP", |c: &mut TankContext, v| c.commit_gain(Ph, Gain::Kp, v)),
                (Ph, Gain::Ki) => ("Set KI", |c: &mut TankContext, v| c.commit_gain(Ph, Gain::Ki, v)),
                (Ph, Gain::Kd) => ("Set KD", |c: &mut TankContext, v| c.commit_gain(Ph, Gain::Kd, v)),
                (Temperature, Gain::Kp) => ("Set temp KP", |c: &mut TankContext, v| {
                    c.commit_gain(Temperature, Gain::Kp, v)
                }),
                (Temperature, Gain::Ki) => ("Set temp KI", |c: &mut TankContext, v| {
                    c.commit_gain(Temperature, Gain::Ki, v)
                }),
                (Temperature, Gain::Kd) => ("Set temp KD", |c: &mut TankContext, v| {
                    c.commit_gain(Temperature, Gain::Kd, v)
                }),
            };
            NumericEntryState::new(prompt, NumberFormat::Decimal { places: 1 }, 0.0, MAX_GAIN, commit)
        }
        EntryField::TankId => NumericEntryState::new(
            "Set Tank ID#",
            NumberFormat::Integer,
            f64::from(TANK_ID_RANGE.0),
            f64::from(TANK_ID_RANGE.1),
            TankContext::commit_tank_id,
        ),
        EntryField::LogInterval => NumericEntryState::new(
            "Log every (min)",
            NumberFormat::Integer,
            f64::from(LOG_INTERVAL_RANGE.0),
            f64::from(LOG_INTERVAL_RANGE.1),
            TankContext::commit_log_interval,
        ),
    }
}

/// Reference entry for one calibration point.
fn calibration_entry(probe: ProbeKind, prompt: &'static str) -> NumericEntryState<TankContext> {
    let (format, max) = match probe {
        ProbeKind::Ph => (NumberFormat::Decimal { places: 3 }, 14.0),
        ProbeKind::Temperature => (NumberFormat::Decimal { places: 2 }, 100.0),
    };
    NumericEntryState::new(prompt, format, 0.0, max, TankContext::capture_calibration)
}

fn save_lines(probe: ProbeKind, ctx: &TankContext) -> (String, String) {
    let name = probe_name(probe);
    match ctx.wizard.state() {
        WizardState::Confirming => (format!("Save {name} cal?"), "Sel=yes Back=no".to_string()),
        WizardState::Committed => {
            let m = ctx.calibration(probe);
            (format!("{name} cal saved"), format!("m={:.4}", m.slope))
        }
        WizardState::Aborted => (
            format!("{name} cal failed"),
            ctx.wizard
                .last_error()
                .map_or_else(|| "aborted".to_string(), ToString::to_string),
        ),
        WizardState::Idle | WizardState::AwaitingPoint(_) => (format!("{name} cal"), String::new()),
    }
}

fn see_lines(field: SeeField, ctx: &TankContext, now: Timestamp) -> (String, String) {
    match field {
        SeeField::Setpoints => (
            format!("T set {:.2}", ctx.setpoint(ProbeKind::Temperature)),
            format!("pH set {:.3}", ctx.setpoint(ProbeKind::Ph)),
        ),
        SeeField::Gains(probe) => {
            let g = ctx.gains(probe);
            (
                format!("{} KP {:.1}", probe_name(probe), g.kp),
                format!("KI {:.1} KD {:.1}", g.ki, g.kd),
            )
        }
        SeeField::Calibration(probe) => {
            let m = ctx.calibration(probe);
            if m.is_identity() {
                (format!("{} cal", probe_name(probe)), "none".to_string())
            } else {
                (format!("m={:.5}", m.slope), format!("b={:.5}", m.intercept))
            }
        }
        SeeField::Outputs => {
            let on = |p: Option<PolicyPhase>| match p {
                Some(PolicyPhase::Driving) => "on",
                Some(_) => "off",
                None => "--",
            };
            let t = ctx.temperature.policy();
            (
                format!(
                    "Heat {} Cool {}",
                    on(t.phase(Channel::Heater)),
                    on(t.phase(Channel::Chiller))
                ),
                format!("Dose {}", on(ctx.ph.policy().phase(Channel::Dose))),
            )
        }
        SeeField::TankId => ("Tank ID".to_string(), ctx.tank_id.to_string()),
        SeeField::LogInterval => (
            "Log interval".to_string(),
            format!("{} min", ctx.log_interval_min),
        ),
        SeeField::Uptime => ("Uptime".to_string(), format_uptime(now)),
        SeeField::Version => (
            "Version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
    }
}

fn probe_name(probe: ProbeKind) -> &'static str {
    match probe {
        ProbeKind::Ph => "pH",
        ProbeKind::Temperature => "Temp",
    }
}

fn fmt_opt(v: Option<f64>, places: usize, unit: &str) -> String {
    match v {
        Some(v) => format!("{v:.places$}{unit}"),
        None => format!("--{unit}"),
    }
}

/// `d h m s` from controller milliseconds.
pub fn format_uptime(ms: Timestamp) -> String {
    let s = ms / 1000;
    format!(
        "{}d {}h {}m {}s",
        s / 86_400,
        (s / 3600) % 24,
        (s / 60) % 60,
        s % 60
    )
}

/// Cut `s` to at most `width` characters.
pub fn fit_line(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_breaks_down() {
        assert_eq!(format_uptime(90_061_000), "1d 1h 1m 1s");
    }

    #[test]
    fn fit_line_truncates_on_chars() {
        assert_eq!(fit_line("25.00C pH 7.000 extra", 16), "25.00C pH 7.000 ");
        assert_eq!(fit_line("short", 16), "short");
    }
}
