//! Generic `Actuator` trait for motors, servos, and any other output the
//! board drives.
//!
//! Actuators remember the last value they were commanded.  The registry
//! reports it through its accessors and logs which motors were still moving
//! when it stops them.

use ardhal_types::{HalError, Pin, SerialPins};

use crate::bus::{HardwareBus, WriteTarget};

/// An output device driven through the [`HardwareBus`].
pub trait Actuator: Send {
    /// Where writes for this actuator are routed.
    fn target(&self) -> WriteTarget;

    /// Apply `value` and remember it.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::Bus`] if the write cannot be delivered; the
    /// remembered value is left unchanged in that case.
    fn apply(&mut self, bus: &mut dyn HardwareBus, value: i32) -> Result<(), HalError>;

    /// Most recently applied value.
    fn value(&self) -> i32;
}

/// An external motor controller board reached over a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorController {
    pins: SerialPins,
}

impl MotorController {
    pub fn new(tx: Pin, rx: Pin) -> Self {
        Self {
            pins: SerialPins { tx, rx },
        }
    }

    pub fn pins(&self) -> SerialPins {
        self.pins
    }
}

/// A drive motor with a signed speed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motor {
    controller: Option<SerialPins>,
    channel: u8,
    speed: i16,
}

impl Motor {
    /// A motor on `channel` of `controller`, or driven directly when
    /// `controller` is `None`.
    pub fn new(controller: Option<&MotorController>, channel: u8) -> Self {
        Self {
            controller: controller.map(MotorController::pins),
            channel,
            speed: 0,
        }
    }

    pub fn set_speed(&mut self, bus: &mut dyn HardwareBus, speed: i16) -> Result<(), HalError> {
        self.apply(bus, i32::from(speed))
    }

    pub fn speed(&self) -> i16 {
        self.speed
    }
}

impl Actuator for Motor {
    fn target(&self) -> WriteTarget {
        WriteTarget::Motor {
            controller: self.controller,
            channel: self.channel,
        }
    }

    fn apply(&mut self, bus: &mut dyn HardwareBus, value: i32) -> Result<(), HalError> {
        let speed = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        bus.write(self.target(), i32::from(speed))?;
        self.speed = speed;
        Ok(())
    }

    fn value(&self) -> i32 {
        i32::from(self.speed)
    }
}

/// A positional hobby servo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Servo {
    pin: Pin,
    angle: u8,
}

impl Servo {
    pub fn new(pin: Pin) -> Self {
        Self { pin, angle: 0 }
    }

    pub fn set_angle(&mut self, bus: &mut dyn HardwareBus, angle: u8) -> Result<(), HalError> {
        self.apply(bus, i32::from(angle))
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }
}

impl Actuator for Servo {
    fn target(&self) -> WriteTarget {
        WriteTarget::Servo { pin: self.pin }
    }

    fn apply(&mut self, bus: &mut dyn HardwareBus, value: i32) -> Result<(), HalError> {
        let angle = value.clamp(0, i32::from(u8::MAX)) as u8;
        bus.write(self.target(), i32::from(angle))?;
        self.angle = angle;
        Ok(())
    }

    fn value(&self) -> i32 {
        i32::from(self.angle)
    }
}
