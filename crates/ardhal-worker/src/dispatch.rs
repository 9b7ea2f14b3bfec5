//! Command dispatch: one [`Command`] in, exactly one [`Reply`] out.
//!
//! | Command | Registry call | Reply |
//! |---|---|---|
//! | `ReadIr` | [`get_ir_distance`][DeviceRegistry::get_ir_distance] | `Distance` |
//! | `ReadBump` | [`get_bump_hit`][DeviceRegistry::get_bump_hit] | `Hit` |
//! | `SetMotor` | [`set_motor_speed`][DeviceRegistry::set_motor_speed] | `Ack` |
//! | `SetServo` | [`set_servo_angle`][DeviceRegistry::set_servo_angle] | `Ack` |
//! | `Shutdown` | – | `Error(UnrecognizedCommand)` |
//!
//! Registry failures become `Reply::Error`; the caller decides whether the
//! error ends the worker via [`HalError::is_fatal`].

use ardhal_hal::DeviceRegistry;
use ardhal_types::{Command, HalError, Reply};

/// Execute a client command against the registry.
pub fn dispatch(registry: &mut DeviceRegistry, command: Command) -> Reply {
    let result = match command {
        Command::ReadIr { index } => registry.get_ir_distance(index).map(Reply::Distance),
        Command::ReadBump { index } => registry.get_bump_hit(index).map(Reply::Hit),
        Command::SetMotor { index, speed } => {
            registry.set_motor_speed(index, speed).map(|()| Reply::Ack)
        }
        Command::SetServo { index, angle } => {
            registry.set_servo_angle(index, angle).map(|()| Reply::Ack)
        }
        Command::Shutdown => Err(HalError::UnrecognizedCommand(command.tag().to_string())),
    };
    result.unwrap_or_else(Reply::Error)
}
