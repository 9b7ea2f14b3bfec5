//! In-process simulated bus for tests and dry runs without a board attached.
//!
//! [`SimBus`] implements [`HardwareBus`] against a shared in-memory pin
//! table.  The paired [`SimBusHandle`] stays with the test (or the CLI) and
//! can change input pins and inspect the ordered log of everything the bus
//! was asked to do, even after the bus itself moved onto the worker thread.
//!
//! # Example
//!
//! ```rust
//! use ardhal_hal::{DeviceRegistry, SimBus};
//!
//! let (bus, handle) = SimBus::new();
//! handle.set_digital(2, true);
//!
//! let mut registry = DeviceRegistry::new(Box::new(bus));
//! let bump = registry.add_bump_sensor(2);
//! registry.start().unwrap();
//! assert!(registry.get_bump_hit(bump).unwrap());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ardhal_types::{HalError, Pin};

use crate::bus::{HardwareBus, WriteTarget};

/// One entry of the simulated bus log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Start,
    Stop,
    Write { target: WriteTarget, value: i32 },
}

#[derive(Default)]
struct SimState {
    analog: HashMap<Pin, u16>,
    digital: HashMap<Pin, bool>,
    events: Vec<BusEvent>,
    running: bool,
    fault: Option<String>,
}

/// Simulated microcontroller link.
///
/// Reads and writes fail with [`HalError::Bus`] outside `start`/`stop`, and
/// every call fails while a fault is injected through the [`SimBusHandle`].
pub struct SimBus {
    state: Arc<Mutex<SimState>>,
}

/// Observer/controller side of a [`SimBus`].  Cheap to clone.
#[derive(Clone)]
pub struct SimBusHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimBus {
    /// Create a bus and the handle that drives it.
    pub fn new() -> (Self, SimBusHandle) {
        let state = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimBusHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_fault(state: &SimState) -> Result<(), HalError> {
    match &state.fault {
        Some(details) => Err(HalError::Bus {
            details: details.clone(),
        }),
        None => Ok(()),
    }
}

fn check_io(state: &SimState) -> Result<(), HalError> {
    check_fault(state)?;
    if state.running {
        Ok(())
    } else {
        Err(HalError::Bus {
            details: "bus is not running".to_string(),
        })
    }
}

impl HardwareBus for SimBus {
    fn start(&mut self) -> Result<(), HalError> {
        let mut state = self.state();
        check_fault(&state)?;
        state.running = true;
        state.events.push(BusEvent::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        let mut state = self.state();
        check_fault(&state)?;
        state.running = false;
        state.events.push(BusEvent::Stop);
        Ok(())
    }

    fn analog_read(&mut self, pin: Pin) -> Result<u16, HalError> {
        let state = self.state();
        check_io(&state)?;
        Ok(state.analog.get(&pin).copied().unwrap_or(0))
    }

    fn digital_read(&mut self, pin: Pin) -> Result<bool, HalError> {
        let state = self.state();
        check_io(&state)?;
        Ok(state.digital.get(&pin).copied().unwrap_or(false))
    }

    fn write(&mut self, target: WriteTarget, value: i32) -> Result<(), HalError> {
        let mut state = self.state();
        check_io(&state)?;
        state.events.push(BusEvent::Write { target, value });
        Ok(())
    }
}

impl SimBusHandle {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the value returned by analog reads of `pin`.
    pub fn set_analog(&self, pin: Pin, value: u16) {
        self.state().analog.insert(pin, value);
    }

    /// Set the value returned by digital reads of `pin`.
    pub fn set_digital(&self, pin: Pin, value: bool) {
        self.state().digital.insert(pin, value);
    }

    /// Make every subsequent bus call fail with [`HalError::Bus`].
    pub fn inject_fault(&self, details: impl Into<String>) {
        self.state().fault = Some(details.into());
    }

    pub fn clear_fault(&self) {
        self.state().fault = None;
    }

    /// Whether the bus is between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Snapshot of the event log in call order.
    pub fn events(&self) -> Vec<BusEvent> {
        self.state().events.clone()
    }

    /// Only the writes, in call order.
    pub fn writes(&self) -> Vec<(WriteTarget, i32)> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Write { target, value } => Some((*target, *value)),
                _ => None,
            })
            .collect()
    }
}
