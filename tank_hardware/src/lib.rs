//! Collaborator implementations for the tank controller: a simulated tank,
//! record stores, remote loggers and (with `hardware`) GPIO relays.
pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod remote;
pub mod sim;
pub mod store;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use gpio::GpioRelays;
pub use remote::{MemoryRemoteLogger, TracingRemoteLogger};
pub use sim::{ProbeFault, SimSettings, SimulatedProbes, SimulatedRelays, SimulatedTank};
pub use store::{FileStore, MemoryStore};
