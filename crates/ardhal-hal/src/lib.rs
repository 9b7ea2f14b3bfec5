//! `ardhal-hal` – device handles and the registry that owns the bus.
//!
//! # Modules
//!
//! - [`bus`] – the [`HardwareBus`][bus::HardwareBus] trait every
//!   microcontroller driver implements.
//! - [`sensor`] – the [`Sensor`][sensor::Sensor] capability with analog
//!   ([`IrSensor`][sensor::IrSensor]) and digital
//!   ([`BumpSensor`][sensor::BumpSensor]) variants.
//! - [`actuator`] – [`Motor`][actuator::Motor], [`Servo`][actuator::Servo]
//!   and [`MotorController`][actuator::MotorController].
//! - [`registry`] – [`DeviceRegistry`][registry::DeviceRegistry]: indexed
//!   device collections plus exclusive ownership of the bus.
//! - [`wiring`] – [`Wiring`][wiring::Wiring]: declarative device layout
//!   loaded from configuration.
//! - [`sim`] – [`SimBus`][sim::SimBus]: an in-process bus for tests and
//!   dry runs.

pub mod actuator;
pub mod bus;
pub mod registry;
pub mod sensor;
pub mod sim;
pub mod wiring;

pub use actuator::{Actuator, Motor, MotorController, Servo};
pub use bus::{HardwareBus, WriteTarget};
pub use registry::DeviceRegistry;
pub use sensor::{AnalogInput, BumpSensor, DigitalInput, IrSensor, Sensor};
pub use sim::{BusEvent, SimBus, SimBusHandle};
pub use wiring::Wiring;
