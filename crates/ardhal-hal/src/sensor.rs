//! Generic `Sensor` capability and the two devices built on it.
//!
//! A sensor is a pin plus a read primitive.  [`AnalogInput`] reports a
//! magnitude, [`DigitalInput`] a thresholded boolean.  Concrete devices
//! wrap one of them instead of extending a base type:
//!
//! | Device | Input | Reading |
//! |---|---|---|
//! | [`IrSensor`] | [`AnalogInput`] | raw distance value |
//! | [`BumpSensor`] | [`DigitalInput`] | pressed / released |

use ardhal_types::{HalError, Pin};

use crate::bus::HardwareBus;

/// Something that can be sampled through the bus.
pub trait Sensor: Send {
    /// Value produced by one sample.
    type Reading;

    /// Pin the sensor is wired to.
    fn pin(&self) -> Pin;

    /// Take one sample.
    ///
    /// # Errors
    ///
    /// Propagates [`HalError::Bus`] from the driver.
    fn read(&self, bus: &mut dyn HardwareBus) -> Result<Self::Reading, HalError>;
}

/// An analog input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogInput {
    pin: Pin,
}

impl AnalogInput {
    pub fn new(pin: Pin) -> Self {
        Self { pin }
    }
}

impl Sensor for AnalogInput {
    type Reading = u16;

    fn pin(&self) -> Pin {
        self.pin
    }

    fn read(&self, bus: &mut dyn HardwareBus) -> Result<u16, HalError> {
        bus.analog_read(self.pin)
    }
}

/// A digital input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalInput {
    pin: Pin,
}

impl DigitalInput {
    pub fn new(pin: Pin) -> Self {
        Self { pin }
    }
}

impl Sensor for DigitalInput {
    type Reading = bool;

    fn pin(&self) -> Pin {
        self.pin
    }

    fn read(&self, bus: &mut dyn HardwareBus) -> Result<bool, HalError> {
        bus.digital_read(self.pin)
    }
}

/// Infrared distance sensor.
///
/// The reading is the raw analog value.  Mapping voltage to a physical
/// distance is left to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrSensor {
    input: AnalogInput,
}

impl IrSensor {
    pub fn new(pin: Pin) -> Self {
        Self {
            input: AnalogInput::new(pin),
        }
    }

    pub fn pin(&self) -> Pin {
        self.input.pin()
    }

    /// Current distance reading.
    pub fn distance(&self, bus: &mut dyn HardwareBus) -> Result<f32, HalError> {
        self.input.read(bus).map(f32::from)
    }
}

/// Contact switch reporting whether the chassis hit something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpSensor {
    input: DigitalInput,
}

impl BumpSensor {
    pub fn new(pin: Pin) -> Self {
        Self {
            input: DigitalInput::new(pin),
        }
    }

    pub fn pin(&self) -> Pin {
        self.input.pin()
    }

    /// `true` while the switch is pressed.
    pub fn hit(&self, bus: &mut dyn HardwareBus) -> Result<bool, HalError> {
        self.input.read(bus)
    }
}
