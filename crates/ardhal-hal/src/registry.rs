//! [`DeviceRegistry`] – indexed device collections and exclusive bus owner.
//!
//! Devices are appended to one collection per family and addressed by
//! their zero-based insertion index.  Indices are never reused or
//! compacted.  The registry is the only holder of the [`HardwareBus`]; every
//! read and write lends the bus to the addressed device for one call.
//!
//! # Shutdown ordering
//!
//! [`DeviceRegistry::stop`] zeroes every motor, waits for the settle delay
//! so the motors spin down while the link is still up, and only then stops
//! the bus.

use std::thread;
use std::time::Duration;

use ardhal_types::{DeviceKind, HalError, Pin};
use tracing::{debug, error, info, instrument};

use crate::actuator::{Actuator, Motor, MotorController, Servo};
use crate::bus::{HardwareBus, WriteTarget};
use crate::sensor::{BumpSensor, IrSensor};

/// Time given to the motors to spin down before the bus is released.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Owner of every device handle and of the bus they talk through.
pub struct DeviceRegistry {
    bus: Box<dyn HardwareBus>,
    motor_controllers: Vec<MotorController>,
    motors: Vec<Motor>,
    servos: Vec<Servo>,
    ir_sensors: Vec<IrSensor>,
    bump_sensors: Vec<BumpSensor>,
    settle_delay: Duration,
}

impl DeviceRegistry {
    /// Create an empty registry that takes ownership of `bus`.
    pub fn new(bus: Box<dyn HardwareBus>) -> Self {
        Self {
            bus,
            motor_controllers: Vec::new(),
            motors: Vec::new(),
            servos: Vec::new(),
            ir_sensors: Vec::new(),
            bump_sensors: Vec::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override the spin-down delay used by [`stop`][Self::stop].
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a motor controller board on the given serial pins.
    pub fn add_motor_controller(&mut self, tx_pin: Pin, rx_pin: Pin) -> usize {
        self.motor_controllers
            .push(MotorController::new(tx_pin, rx_pin));
        self.motor_controllers.len() - 1
    }

    /// Register a motor.
    ///
    /// The motor is attached to the most recently registered motor
    /// controller and takes the next free channel on it.  Without any
    /// controller the motor is driven directly.
    pub fn add_motor(&mut self) -> usize {
        let controller = self.motor_controllers.last();
        let pins = controller.map(MotorController::pins);
        let channel = self
            .motors
            .iter()
            .filter(|m| matches!(m.target(), WriteTarget::Motor { controller: c, .. } if c == pins))
            .count();
        let channel = u8::try_from(channel).unwrap_or(u8::MAX);
        self.motors.push(Motor::new(controller, channel));
        self.motors.len() - 1
    }

    pub fn add_servo(&mut self, pin: Pin) -> usize {
        self.servos.push(Servo::new(pin));
        self.servos.len() - 1
    }

    pub fn add_ir_sensor(&mut self, pin: Pin) -> usize {
        self.ir_sensors.push(IrSensor::new(pin));
        self.ir_sensors.len() - 1
    }

    pub fn add_bump_sensor(&mut self, pin: Pin) -> usize {
        self.bump_sensors.push(BumpSensor::new(pin));
        self.bump_sensors.len() - 1
    }

    // -----------------------------------------------------------------------
    // Index-addressed access
    // -----------------------------------------------------------------------

    /// Raw distance reading of IR sensor `index`.
    ///
    /// # Errors
    ///
    /// [`HalError::IndexOutOfRange`] for an unknown index, [`HalError::Bus`]
    /// if the read fails.
    pub fn get_ir_distance(&mut self, index: usize) -> Result<f32, HalError> {
        let sensor = self
            .ir_sensors
            .get(index)
            .ok_or(out_of_range(DeviceKind::IrSensor, index))?;
        sensor.distance(self.bus.as_mut())
    }

    /// Whether bump sensor `index` is pressed.
    pub fn get_bump_hit(&mut self, index: usize) -> Result<bool, HalError> {
        let sensor = self
            .bump_sensors
            .get(index)
            .ok_or(out_of_range(DeviceKind::BumpSensor, index))?;
        sensor.hit(self.bus.as_mut())
    }

    /// Drive motor `index` at `speed`.
    pub fn set_motor_speed(&mut self, index: usize, speed: i16) -> Result<(), HalError> {
        let motor = self
            .motors
            .get_mut(index)
            .ok_or(out_of_range(DeviceKind::Motor, index))?;
        motor.set_speed(self.bus.as_mut(), speed)
    }

    /// Move servo `index` to `angle` degrees.
    pub fn set_servo_angle(&mut self, index: usize, angle: u8) -> Result<(), HalError> {
        let servo = self
            .servos
            .get_mut(index)
            .ok_or(out_of_range(DeviceKind::Servo, index))?;
        servo.set_angle(self.bus.as_mut(), angle)
    }

    /// Last speed commanded to motor `index`.
    pub fn motor_speed(&self, index: usize) -> Result<i16, HalError> {
        self.motors
            .get(index)
            .map(Motor::speed)
            .ok_or(out_of_range(DeviceKind::Motor, index))
    }

    /// Last angle commanded to servo `index`.
    pub fn servo_angle(&self, index: usize) -> Result<u8, HalError> {
        self.servos
            .get(index)
            .map(Servo::angle)
            .ok_or(out_of_range(DeviceKind::Servo, index))
    }

    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    pub fn servo_count(&self) -> usize {
        self.servos.len()
    }

    pub fn ir_sensor_count(&self) -> usize {
        self.ir_sensors.len()
    }

    pub fn bump_sensor_count(&self) -> usize {
        self.bump_sensors.len()
    }

    pub fn motor_controller_count(&self) -> usize {
        self.motor_controllers.len()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Activate the bus.  Reads and writes are valid afterwards.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), HalError> {
        self.bus.start()?;
        info!(
            motors = self.motors.len(),
            servos = self.servos.len(),
            ir_sensors = self.ir_sensors.len(),
            bump_sensors = self.bump_sensors.len(),
            "hardware bus started"
        );
        Ok(())
    }

    /// Zero every motor, wait for the settle delay, then stop the bus.
    ///
    /// Every step is attempted even when an earlier one fails; the first
    /// error is returned once the sequence is complete.
    #[instrument(skip(self), fields(settle_ms = self.settle_delay.as_millis() as u64))]
    pub fn stop(&mut self) -> Result<(), HalError> {
        let mut first_error = None;

        for (index, motor) in self.motors.iter_mut().enumerate() {
            let last = motor.value();
            if last != 0 {
                debug!(index, speed = last, "stopping moving motor");
            }
            if let Err(e) = motor.set_speed(self.bus.as_mut(), 0) {
                error!(index, error = %e, "failed to zero motor during stop");
                first_error.get_or_insert(e);
            }
        }

        debug!("waiting for motors to settle");
        thread::sleep(self.settle_delay);

        if let Err(e) = self.bus.stop() {
            error!(error = %e, "failed to stop hardware bus");
            first_error.get_or_insert(e);
        }

        match first_error {
            None => {
                info!("hardware bus stopped");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

fn out_of_range(device: DeviceKind, index: usize) -> HalError {
    HalError::IndexOutOfRange { device, index }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusEvent, SimBus, SimBusHandle};
    use ardhal_types::SerialPins;

    fn registry() -> (DeviceRegistry, SimBusHandle) {
        let (bus, handle) = SimBus::new();
        let mut registry = DeviceRegistry::new(Box::new(bus)).with_settle_delay(Duration::ZERO);
        registry.start().unwrap();
        (registry, handle)
    }

    #[test]
    fn indices_follow_insertion_order() {
        let (mut reg, _) = registry();
        assert_eq!(reg.add_ir_sensor(0), 0);
        assert_eq!(reg.add_ir_sensor(1), 1);
        assert_eq!(reg.add_bump_sensor(2), 0);
        assert_eq!(reg.add_servo(9), 0);
        assert_eq!(reg.add_motor_controller(18, 19), 0);
        assert_eq!(reg.add_motor(), 0);
        assert_eq!(reg.add_motor(), 1);
        assert_eq!(reg.ir_sensor_count(), 2);
        assert_eq!(reg.motor_controller_count(), 1);
    }

    #[test]
    fn motors_take_successive_channels_on_latest_controller() {
        let (mut reg, handle) = registry();
        reg.add_motor_controller(18, 19);
        reg.add_motor();
        reg.add_motor();
        reg.add_motor_controller(14, 15);
        reg.add_motor();

        reg.set_motor_speed(0, 10).unwrap();
        reg.set_motor_speed(1, 20).unwrap();
        reg.set_motor_speed(2, 30).unwrap();

        let channels: Vec<_> = handle
            .writes()
            .into_iter()
            .map(|(target, _)| target)
            .collect();
        assert_eq!(
            channels,
            vec![
                WriteTarget::Motor {
                    controller: Some(SerialPins { tx: 18, rx: 19 }),
                    channel: 0
                },
                WriteTarget::Motor {
                    controller: Some(SerialPins { tx: 18, rx: 19 }),
                    channel: 1
                },
                WriteTarget::Motor {
                    controller: Some(SerialPins { tx: 14, rx: 15 }),
                    channel: 0
                },
            ]
        );
    }

    #[test]
    fn two_motors_one_bump_scenario() {
        let (mut reg, handle) = registry();
        reg.add_motor_controller(18, 19);
        reg.add_motor();
        reg.add_motor();
        reg.add_bump_sensor(2);
        handle.set_digital(2, true);

        reg.set_motor_speed(0, 50).unwrap();
        reg.set_motor_speed(1, -50).unwrap();
        assert!(reg.get_bump_hit(0).unwrap());

        let err = reg.set_motor_speed(2, 0).unwrap_err();
        assert_eq!(
            err,
            HalError::IndexOutOfRange {
                device: DeviceKind::Motor,
                index: 2
            }
        );
    }

    #[test]
    fn unknown_indices_are_rejected_per_family() {
        let (mut reg, _) = registry();
        assert!(matches!(
            reg.get_ir_distance(0),
            Err(HalError::IndexOutOfRange {
                device: DeviceKind::IrSensor,
                ..
            })
        ));
        assert!(matches!(
            reg.get_bump_hit(3),
            Err(HalError::IndexOutOfRange {
                device: DeviceKind::BumpSensor,
                index: 3
            })
        ));
        assert!(reg.set_servo_angle(0, 90).is_err());
        assert!(reg.motor_speed(0).is_err());
    }

    #[test]
    fn sensors_at_neighbouring_indices_are_independent() {
        let (mut reg, handle) = registry();
        reg.add_ir_sensor(0);
        reg.add_ir_sensor(1);
        reg.add_bump_sensor(2);
        reg.add_bump_sensor(3);
        handle.set_analog(0, 120);
        handle.set_analog(1, 880);
        handle.set_digital(3, true);

        assert!((reg.get_ir_distance(0).unwrap() - 120.0).abs() < f32::EPSILON);
        assert!((reg.get_ir_distance(1).unwrap() - 880.0).abs() < f32::EPSILON);
        assert!(!reg.get_bump_hit(0).unwrap());
        assert!(reg.get_bump_hit(1).unwrap());
    }

    #[test]
    fn motor_writes_do_not_touch_other_devices() {
        let (mut reg, handle) = registry();
        reg.add_motor();
        reg.add_motor();
        reg.add_servo(9);
        reg.add_ir_sensor(0);
        handle.set_analog(0, 300);

        reg.set_servo_angle(0, 45).unwrap();
        reg.set_motor_speed(1, 77).unwrap();

        assert_eq!(reg.motor_speed(0).unwrap(), 0);
        assert_eq!(reg.motor_speed(1).unwrap(), 77);
        assert_eq!(reg.servo_angle(0).unwrap(), 45);
        assert!((reg.get_ir_distance(0).unwrap() - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn stop_zeroes_motors_before_bus_stops() {
        let (mut reg, handle) = registry();
        reg.add_motor();
        reg.add_motor();
        reg.set_motor_speed(0, 60).unwrap();
        reg.set_motor_speed(1, -60).unwrap();

        reg.stop().unwrap();

        let events = handle.events();
        assert_eq!(events.last(), Some(&BusEvent::Stop));
        let tail: Vec<_> = events[events.len() - 3..events.len() - 1].to_vec();
        assert!(
            tail.iter()
                .all(|e| matches!(e, BusEvent::Write { value: 0, .. }))
        );
        assert_eq!(reg.motor_speed(0).unwrap(), 0);
        assert_eq!(reg.motor_speed(1).unwrap(), 0);
        assert!(!handle.is_running());
    }

    #[test]
    fn stop_waits_for_settle_delay() {
        let (bus, _handle) = SimBus::new();
        let mut reg =
            DeviceRegistry::new(Box::new(bus)).with_settle_delay(Duration::from_millis(50));
        reg.add_motor();
        reg.start().unwrap();

        let started = std::time::Instant::now();
        reg.stop().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn stop_reports_bus_fault_after_attempting_everything() {
        let (mut reg, handle) = registry();
        reg.add_motor();
        handle.inject_fault("brown-out");

        let err = reg.stop().unwrap_err();
        assert!(matches!(err, HalError::Bus { .. }));
    }
}
