//! Fixed-period scheduler: one pass polls the keypad, runs whichever control
//! loops are due, logs remotely on its cadence and refreshes the display.
//!
//! The controller owns every collaborator; nothing is looked up globally.

use std::time::{Duration, Instant};

use tank_traits::clock::{Clock, MonotonicClock};
use tank_traits::{
    Actuator, Channel, Display, KeyEvent, KeypadSource, ProbeKind, ProbeReader, RecordStore,
    RemoteLogger, TankReading,
};

use crate::Timestamp;
use crate::config::ControllerCfg;
use crate::context::TankContext;
use crate::control::{TickOutcome, compensation_celsius};
use crate::error::{BuildError, Result};
use crate::menu::{MenuCfg, MenuStateMachine};
use crate::mocks::{NoopLogger, NullDisplay, NullKeypad};
use crate::policy::ActuatorPolicy;

/// What one scheduler pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub now: Timestamp,
    pub key: Option<KeyEvent>,
    pub temperature: TickOutcome,
    pub ph: TickOutcome,
    /// A remote log record was sent.
    pub logged: bool,
    /// The display was redrawn.
    pub rendered: bool,
}

pub struct TankController {
    ctx: TankContext,
    menu: MenuStateMachine,
    probes: Box<dyn ProbeReader>,
    actuator: Box<dyn Actuator>,
    keypad: Box<dyn KeypadSource>,
    display: Box<dyn Display>,
    logger: Box<dyn RemoteLogger>,
    clock: Box<dyn Clock + Send + Sync>,
    epoch: Instant,
    sensor_timeout: Duration,
    last_log_at: Timestamp,
    last_frame: Option<String>,
}

impl std::fmt::Debug for TankController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TankController")
            .field("tank_id", &self.ctx.tank_id)
            .field("menu", &self.menu.current())
            .field("temperature", &self.ctx.temperature.value())
            .field("ph", &self.ctx.ph.value())
            .finish_non_exhaustive()
    }
}

impl TankController {
    pub fn builder() -> TankControllerBuilder {
        TankControllerBuilder::default()
    }

    /// Milliseconds since construction on the controller clock.
    pub fn now(&self) -> Timestamp {
        self.clock.ms_since(self.epoch)
    }

    pub fn context(&self) -> &TankContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut TankContext {
        &mut self.ctx
    }

    pub fn menu(&self) -> &MenuStateMachine {
        &self.menu
    }

    /// Current display frame.
    pub fn frame(&self) -> String {
        self.menu.render(&self.ctx, self.now())
    }

    /// Feed one key directly, bypassing the keypad source.
    pub fn press(&mut self, key: KeyEvent) {
        let now = self.now();
        self.menu.handle_key(key, &mut self.ctx, now);
    }

    /// One scheduler pass.
    pub fn tick(&mut self) -> TickReport {
        let now = self.now();
        self.ctx.now = now;

        let key = self.keypad.poll();
        if let Some(key) = key {
            tracing::trace!(?key, "key");
            self.menu.handle_key(key, &mut self.ctx, now);
        }
        self.menu.tick(now, &mut self.ctx);

        let timeout = self.sensor_timeout;
        let suspended = self.ctx.is_suspended(ProbeKind::Temperature);
        let temperature = self.ctx.temperature.tick(
            now,
            self.probes.as_mut(),
            self.actuator.as_mut(),
            timeout,
            suspended,
        );
        if let TickOutcome::Controlled { value, .. } = temperature {
            self.probes
                .set_temperature_compensation(compensation_celsius(value));
        }

        let suspended = self.ctx.is_suspended(ProbeKind::Ph);
        let ph = self.ctx.ph.tick(
            now,
            self.probes.as_mut(),
            self.actuator.as_mut(),
            timeout,
            suspended,
        );

        let logged = self.maybe_log(now);

        let frame = self.menu.render(&self.ctx, now);
        let rendered = self.last_frame.as_deref() != Some(frame.as_str());
        if rendered {
            self.display.render(&frame);
            self.last_frame = Some(frame);
        }

        TickReport {
            now,
            key,
            temperature,
            ph,
            logged,
            rendered,
        }
    }

    fn maybe_log(&mut self, now: Timestamp) -> bool {
        let interval_ms = u64::from(self.ctx.log_interval_min).saturating_mul(60_000);
        if interval_ms == 0 || now.saturating_sub(self.last_log_at) < interval_ms {
            return false;
        }
        self.last_log_at = now;
        let reading = self.snapshot(now);
        tracing::info!(
            tank_id = self.ctx.tank_id,
            temperature = ?reading.temperature_c,
            ph = ?reading.ph,
            heater_on_ms = reading.heater_on_ms,
            dose_on_ms = reading.dose_on_ms,
            "remote log"
        );
        self.logger.record(self.ctx.tank_id, &reading, now);
        true
    }

    /// Log record for `now`; consumes the accumulated on-times.
    fn snapshot(&mut self, now: Timestamp) -> TankReading {
        let gains = self.ctx.ph.gains();
        TankReading {
            temperature_c: self.ctx.temperature.value(),
            temperature_setpoint_c: self.ctx.temperature.setpoint(),
            ph: self.ctx.ph.value(),
            ph_setpoint: self.ctx.ph.setpoint(),
            heater_on_ms: self
                .ctx
                .temperature
                .policy_mut()
                .take_on_time_ms(Channel::Heater, now),
            dose_on_ms: self
                .ctx
                .ph
                .policy_mut()
                .take_on_time_ms(Channel::Dose, now),
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
        }
    }

    /// Run passes every `period` until `stop` returns true or `max_ticks`
    /// passes have run. Outputs are switched off on the way out.
    pub fn run(
        &mut self,
        period: Duration,
        max_ticks: Option<u64>,
        stop: &dyn Fn() -> bool,
    ) -> u64 {
        let mut ticks = 0u64;
        while max_ticks.is_none_or(|m| ticks < m) && !stop() {
            self.tick();
            ticks += 1;
            self.clock.sleep(period);
        }
        self.shutdown();
        ticks
    }

    /// Force every channel off.
    pub fn shutdown(&mut self) {
        let now = self.now();
        self.ctx.temperature.force_off(now, self.actuator.as_mut());
        self.ctx.ph.force_off(now, self.actuator.as_mut());
        for ch in [Channel::Heater, Channel::Chiller, Channel::Dose] {
            if let Err(e) = self.actuator.set_drive(ch, false) {
                tracing::warn!(channel = ch.as_str(), error = %e, "shutdown write failed");
            }
        }
        tracing::info!("controller stopped; outputs off");
    }
}

/// Builder for [`TankController`]. Probes, actuator and store are required;
/// keypad, display and logger default to do-nothing implementations.
#[derive(Default)]
pub struct TankControllerBuilder {
    cfg: Option<ControllerCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    store: Option<Box<dyn RecordStore>>,
    probes: Option<Box<dyn ProbeReader>>,
    actuator: Option<Box<dyn Actuator>>,
    keypad: Option<Box<dyn KeypadSource>>,
    display: Option<Box<dyn Display>>,
    logger: Option<Box<dyn RemoteLogger>>,
}

impl TankControllerBuilder {
    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_store(mut self, store: impl RecordStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_probes(mut self, probes: impl ProbeReader + 'static) -> Self {
        self.probes = Some(Box::new(probes));
        self
    }

    pub fn with_actuator(mut self, actuator: impl Actuator + 'static) -> Self {
        self.actuator = Some(Box::new(actuator));
        self
    }

    pub fn with_keypad(mut self, keypad: impl KeypadSource + 'static) -> Self {
        self.keypad = Some(Box::new(keypad));
        self
    }

    pub fn with_display(mut self, display: impl Display + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn with_logger(mut self, logger: impl RemoteLogger + 'static) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    /// Validate, restore persisted settings and build.
    pub fn try_build(self) -> Result<TankController> {
        let cfg = self.cfg.unwrap_or_default();
        cfg.check()?;
        let store = self.store.ok_or(BuildError::Missing("store"))?;
        let probes = self.probes.ok_or(BuildError::Missing("probes"))?;
        let actuator = self.actuator.ok_or(BuildError::Missing("actuator"))?;
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(MonotonicClock::new()));

        let mut ctx = TankContext::new(&cfg, store);
        ctx.restore();
        let menu = MenuStateMachine::new(MenuCfg {
            line_width: cfg.line_width,
            idle_timeout_ms: cfg.idle_timeout_ms,
        });
        let epoch = clock.now();
        tracing::info!(
            tank_id = ctx.tank_id,
            temperature_tick_ms = cfg.temperature.control.tick_ms,
            ph_tick_ms = cfg.ph.control.tick_ms,
            "tank controller built"
        );
        Ok(TankController {
            ctx,
            menu,
            probes,
            actuator,
            keypad: self.keypad.unwrap_or_else(|| Box::new(NullKeypad)),
            display: self.display.unwrap_or_else(|| Box::new(NullDisplay)),
            logger: self.logger.unwrap_or_else(|| Box::new(NoopLogger)),
            clock,
            epoch,
            sensor_timeout: Duration::from_millis(cfg.sensor_timeout_ms),
            last_log_at: 0,
            last_frame: None,
        })
    }
}
