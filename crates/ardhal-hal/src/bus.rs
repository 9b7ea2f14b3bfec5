//! The [`HardwareBus`] trait – the single line to the microcontroller.
//!
//! A bus driver owns the serial/USB link to the board.  Device handles never
//! hold a reference to it; the [`DeviceRegistry`][crate::registry::DeviceRegistry]
//! lends it to them for the duration of one read or write.

use ardhal_types::{HalError, Pin, SerialPins};

/// Destination of an output write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// A motor, optionally driven through an external controller board.
    /// `channel` is the motor's slot on that controller.
    Motor {
        controller: Option<SerialPins>,
        channel: u8,
    },
    /// A hobby servo on a PWM pin.
    Servo { pin: Pin },
}

/// Communication primitives required from a microcontroller driver.
///
/// Reads and writes are only valid between [`start`][Self::start] and
/// [`stop`][Self::stop].
///
/// # Errors
///
/// Every method returns [`HalError::Bus`] when the link fails.
pub trait HardwareBus: Send {
    /// Open the link and begin whatever polling the board requires.
    fn start(&mut self) -> Result<(), HalError>;

    /// Halt polling and release the link.
    fn stop(&mut self) -> Result<(), HalError>;

    /// Sample an analog pin.
    fn analog_read(&mut self, pin: Pin) -> Result<u16, HalError>;

    /// Sample a digital pin.
    fn digital_read(&mut self, pin: Pin) -> Result<bool, HalError>;

    /// Write `value` to an output.  Motors take a signed speed, servos an
    /// angle in degrees.
    fn write(&mut self, target: WriteTarget, value: i32) -> Result<(), HalError>;
}
