//! [`Wiring`] – declarative description of what is plugged into the board.
//!
//! Loaded from the `[wiring]` table of the configuration file and turned
//! into a populated [`DeviceRegistry`] with [`Wiring::build`].
//!
//! ```toml
//! direct_motors = 0
//! servo_pins = [9]
//! ir_pins = [0, 1]
//! bump_pins = [2, 3, 4]
//!
//! [[motor_controllers]]
//! tx = 18
//! rx = 19
//! motors = 2
//! ```

use ardhal_types::Pin;
use serde::{Deserialize, Serialize};

use crate::bus::HardwareBus;
use crate::registry::DeviceRegistry;

/// One motor controller board and the number of motors hanging off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerWiring {
    pub tx: Pin,
    pub rx: Pin,
    #[serde(default)]
    pub motors: usize,
}

/// Device layout of the robot.
///
/// Indices in the resulting registry follow declaration order within each
/// family.  Directly driven motors are registered before any controller,
/// so they take the lowest motor indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wiring {
    pub direct_motors: usize,
    pub motor_controllers: Vec<ControllerWiring>,
    pub servo_pins: Vec<Pin>,
    pub ir_pins: Vec<Pin>,
    pub bump_pins: Vec<Pin>,
}

impl Default for Wiring {
    /// The stock chassis: one motor controller on pins 18/19 driving the
    /// two wheels, left/right IR sensors on analog 0/1, and left, right and
    /// power bump switches on pins 2, 3 and 4.
    fn default() -> Self {
        Self {
            direct_motors: 0,
            motor_controllers: vec![ControllerWiring {
                tx: 18,
                rx: 19,
                motors: 2,
            }],
            servo_pins: Vec::new(),
            ir_pins: vec![0, 1],
            bump_pins: vec![2, 3, 4],
        }
    }
}

impl Wiring {
    /// A layout with nothing connected.
    pub fn empty() -> Self {
        Self {
            direct_motors: 0,
            motor_controllers: Vec::new(),
            servo_pins: Vec::new(),
            ir_pins: Vec::new(),
            bump_pins: Vec::new(),
        }
    }

    /// Total number of motors described by this layout.
    pub fn motor_count(&self) -> usize {
        self.direct_motors + self.motor_controllers.iter().map(|c| c.motors).sum::<usize>()
    }

    /// Register every described device on a fresh registry owning `bus`.
    pub fn build(&self, bus: Box<dyn HardwareBus>) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new(bus);
        for _ in 0..self.direct_motors {
            registry.add_motor();
        }
        for controller in &self.motor_controllers {
            registry.add_motor_controller(controller.tx, controller.rx);
            for _ in 0..controller.motors {
                registry.add_motor();
            }
        }
        for &pin in &self.servo_pins {
            registry.add_servo(pin);
        }
        for &pin in &self.ir_pins {
            registry.add_ir_sensor(pin);
        }
        for &pin in &self.bump_pins {
            registry.add_bump_sensor(pin);
        }
        registry
    }
}
