//! Static menu tree: node identities and their descriptors.
//!
//! ```text
//!  MainMenu
//!   ├── Set pH target / Set tank temp / Set [temp] KP KI KD / Set tank ID / Set log intvl   (numeric entry)
//!   ├── pH calibrate ─▶ Lowpoint ─▶ Midpoint ─▶ Highpoint ─▶ Save                     (wizard)
//!   ├── Temp calibrate ─▶ Lowpoint ─▶ Highpoint ─▶ Save                                (wizard)
//!   ├── PID on/off, Clear pH cal, Clear temp cal                                       (actions)
//!   └── See ...                                                                         (display only)
//! ```
//!
//! Every node's parent is `MainMenu`. Calibration steps past the first are
//! reached only by the wizard advancing, never from the root list.

use tank_traits::ProbeKind;

use crate::context::Gain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MenuId {
    MainMenu = 0,
    SetPhSetpoint,
    SetTempSetpoint,
    PhCalibrationLow,
    PhCalibrationMid,
    PhCalibrationHigh,
    PhCalibrationSave,
    TempCalibrationLow,
    TempCalibrationHigh,
    TempCalibrationSave,
    SetKp,
    SetKi,
    SetKd,
    SetTempKp,
    SetTempKi,
    SetTempKd,
    ToggleDoseMode,
    ClearPhCalibration,
    ClearTempCalibration,
    SetTankId,
    SetLogInterval,
    SeeSetpoints,
    SeePhPid,
    SeeTempPid,
    SeePhCalibration,
    SeeTempCalibration,
    SeeOutputs,
    SeeTankId,
    SeeLogInterval,
    SeeUptime,
    SeeVersion,
}

impl MenuId {
    /// Total number of nodes; sizes the descriptor table.
    pub const COUNT: usize = 31;

    pub fn descriptor(self) -> &'static NodeDescriptor {
        &NODES[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }

    pub fn kind(self) -> NodeKind {
        self.descriptor().kind
    }

    pub fn parent(self) -> Option<MenuId> {
        self.descriptor().parent
    }

    /// Calibration step node for `probe` at point `index`.
    pub fn calibration_step(probe: ProbeKind, index: usize) -> Option<MenuId> {
        match (probe, index) {
            (ProbeKind::Ph, 0) => Some(MenuId::PhCalibrationLow),
            (ProbeKind::Ph, 1) => Some(MenuId::PhCalibrationMid),
            (ProbeKind::Ph, 2) => Some(MenuId::PhCalibrationHigh),
            (ProbeKind::Temperature, 0) => Some(MenuId::TempCalibrationLow),
            (ProbeKind::Temperature, 1) => Some(MenuId::TempCalibrationHigh),
            _ => None,
        }
    }

    pub fn calibration_save(probe: ProbeKind) -> MenuId {
        match probe {
            ProbeKind::Ph => MenuId::PhCalibrationSave,
            ProbeKind::Temperature => MenuId::TempCalibrationSave,
        }
    }
}

/// Values editable through numeric entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Setpoint(ProbeKind),
    Gain(ProbeKind, Gain),
    TankId,
    LogInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    ClearCalibration(ProbeKind),
    ToggleDoseMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeeField {
    Setpoints,
    Gains(ProbeKind),
    Calibration(ProbeKind),
    Outputs,
    TankId,
    LogInterval,
    Uptime,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Menu,
    Entry(EntryField),
    /// Reference entry for one wizard point.
    CalibrationPoint {
        probe: ProbeKind,
        index: usize,
        prompt: &'static str,
    },
    CalibrationSave(ProbeKind),
    Action(ActionKind),
    See(SeeField),
}

/// One row of the menu table.
#[derive(Debug)]
pub struct NodeDescriptor {
    pub id: MenuId,
    pub label: &'static str,
    pub parent: Option<MenuId>,
    pub kind: NodeKind,
}

const fn node(id: MenuId, label: &'static str, kind: NodeKind) -> NodeDescriptor {
    NodeDescriptor {
        id,
        label,
        parent: Some(MenuId::MainMenu),
        kind,
    }
}

const fn cal(probe: ProbeKind, index: usize, prompt: &'static str) -> NodeKind {
    NodeKind::CalibrationPoint {
        probe,
        index,
        prompt,
    }
}

use ProbeKind::{Ph, Temperature};

/// Indexed by `MenuId as usize`.
pub static NODES: [NodeDescriptor; MenuId::COUNT] = [
    NodeDescriptor {
        id: MenuId::MainMenu,
        label: "Main menu",
        parent: None,
        kind: NodeKind::Menu,
    },
    node(MenuId::SetPhSetpoint, "Set pH target", NodeKind::Entry(EntryField::Setpoint(Ph))),
    node(MenuId::SetTempSetpoint, "Set tank temp", NodeKind::Entry(EntryField::Setpoint(Temperature))),
    node(MenuId::PhCalibrationLow, "pH calibrate", cal(Ph, 0, "pH-Lowpoint")),
    node(MenuId::PhCalibrationMid, "pH calibrate", cal(Ph, 1, "pH-Midpoint")),
    node(MenuId::PhCalibrationHigh, "pH calibrate", cal(Ph, 2, "pH-Highpoint")),
    node(MenuId::PhCalibrationSave, "pH calibrate", NodeKind::CalibrationSave(Ph)),
    node(MenuId::TempCalibrationLow, "Temp calibrate", cal(Temperature, 0, "Temp-Lowpoint")),
    node(MenuId::TempCalibrationHigh, "Temp calibrate", cal(Temperature, 1, "Temp-Highpoint")),
    node(MenuId::TempCalibrationSave, "Temp calibrate", NodeKind::CalibrationSave(Temperature)),
    node(MenuId::SetKp, "Set KP", NodeKind::Entry(EntryField::Gain(Ph, Gain::Kp))),
    node(MenuId::SetKi, "Set KI", NodeKind::Entry(EntryField::Gain(Ph, Gain::Ki))),
    node(MenuId::SetKd, "Set KD", NodeKind::Entry(EntryField::Gain(Ph, Gain::Kd))),
    node(MenuId::SetTempKp, "Set temp KP", NodeKind::Entry(EntryField::Gain(Temperature, Gain::Kp))),
    node(MenuId::SetTempKi, "Set temp KI", NodeKind::Entry(EntryField::Gain(Temperature, Gain::Ki))),
    node(MenuId::SetTempKd, "Set temp KD", NodeKind::Entry(EntryField::Gain(Temperature, Gain::Kd))),
    node(MenuId::ToggleDoseMode, "PID on/off", NodeKind::Action(ActionKind::ToggleDoseMode)),
    node(MenuId::ClearPhCalibration, "Clear pH cal", NodeKind::Action(ActionKind::ClearCalibration(Ph))),
    node(
        MenuId::ClearTempCalibration,
        "Clear temp cal",
        NodeKind::Action(ActionKind::ClearCalibration(Temperature)),
    ),
    node(MenuId::SetTankId, "Set tank ID", NodeKind::Entry(EntryField::TankId)),
    node(MenuId::SetLogInterval, "Set log intvl", NodeKind::Entry(EntryField::LogInterval)),
    node(MenuId::SeeSetpoints, "See setpoints", NodeKind::See(SeeField::Setpoints)),
    node(MenuId::SeePhPid, "See pH PID", NodeKind::See(SeeField::Gains(Ph))),
    node(MenuId::SeeTempPid, "See temp PID", NodeKind::See(SeeField::Gains(Temperature))),
    node(MenuId::SeePhCalibration, "See pH cal", NodeKind::See(SeeField::Calibration(Ph))),
    node(
        MenuId::SeeTempCalibration,
        "See temp cal",
        NodeKind::See(SeeField::Calibration(Temperature)),
    ),
    node(MenuId::SeeOutputs, "See outputs", NodeKind::See(SeeField::Outputs)),
    node(MenuId::SeeTankId, "See tank ID", NodeKind::See(SeeField::TankId)),
    node(MenuId::SeeLogInterval, "See log intvl", NodeKind::See(SeeField::LogInterval)),
    node(MenuId::SeeUptime, "See uptime", NodeKind::See(SeeField::Uptime)),
    node(MenuId::SeeVersion, "See version", NodeKind::See(SeeField::Version)),
];

/// Items listed on the main menu, in cursor order.
pub const ROOT_ITEMS: [MenuId; 25] = [
    MenuId::SetPhSetpoint,
    MenuId::SetTempSetpoint,
    MenuId::PhCalibrationLow,
    MenuId::TempCalibrationLow,
    MenuId::SetKp,
    MenuId::SetKi,
    MenuId::SetKd,
    MenuId::SetTempKp,
    MenuId::SetTempKi,
    MenuId::SetTempKd,
    MenuId::ToggleDoseMode,
    MenuId::ClearPhCalibration,
    MenuId::ClearTempCalibration,
    MenuId::SetTankId,
    MenuId::SetLogInterval,
    MenuId::SeeSetpoints,
    MenuId::SeePhPid,
    MenuId::SeeTempPid,
    MenuId::SeePhCalibration,
    MenuId::SeeTempCalibration,
    MenuId::SeeOutputs,
    MenuId::SeeTankId,
    MenuId::SeeLogInterval,
    MenuId::SeeUptime,
    MenuId::SeeVersion,
];
