#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control-and-calibration engine for the tank controller (hardware-agnostic).
//!
//! All hardware, storage and front-panel access goes through the traits in
//! `tank_traits`; this crate only computes.
//!
//! ## Architecture
//!
//! - **PID**: discrete controller with integral anti-windup (`pid`)
//! - **Policies**: heater/chiller pair and pH doser on a shared pulse gate (`policy`)
//! - **Calibration**: least-squares fit and the capture wizard (`calibration`, `wizard`)
//! - **Control loops**: probe → calibration → smoothing → PID → policy (`control`)
//! - **Menu**: static node table, numeric entry, keypad handling (`menu`)
//! - **Records**: typed persistent store over string records (`store`)
//! - **Scheduler**: the single-threaded tick that ties it together (`scheduler`)
//!
//! ## Time
//!
//! Everything inside the engine runs on [`Timestamp`]: milliseconds since the
//! controller started, read from a `tank_traits::Clock` once per pass.

pub mod calibration;
pub mod config;
pub mod context;
pub mod control;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod menu;
pub mod mocks;
pub mod pid;
pub mod policy;
pub mod scheduler;
pub mod store;
pub mod wizard;

/// Controller time in milliseconds.
pub type Timestamp = u64;

pub use calibration::{CalibrationModel, CalibrationPoint, fit};
pub use config::{ControllerCfg, DoseMode};
pub use context::TankContext;
pub use control::{ControlLoop, SensorReading, TickOutcome};
pub use error::{BuildError, CalibrationError, ReadError, Result, StoreError, ValidationError};
pub use menu::MenuStateMachine;
pub use menu::entry::{EntryOutcome, NumberFormat, NumericEntryState};
pub use menu::table::MenuId;
pub use pid::{PidController, PidGains};
pub use policy::{ActuatorPolicy, ControlSignal, DoseController, PolicyPhase, ThermalPair};
pub use scheduler::{TankController, TankControllerBuilder, TickReport};
pub use store::{PersistentStore, RecordId};
pub use wizard::{CalibrationWizard, WizardState};
