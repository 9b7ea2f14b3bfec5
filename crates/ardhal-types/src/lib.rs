//! `ardhal-types` – messages, errors and sensor records shared by every
//! ardhal crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A microcontroller pin number (analog or digital, depending on the device).
pub type Pin = u8;

/// Serial line used to talk to an external motor controller board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialPins {
    pub tx: Pin,
    pub rx: Pin,
}

/// Device families held by the registry.  Used to label index errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Motor,
    Servo,
    IrSensor,
    BumpSensor,
    MotorController,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Motor => write!(f, "motor"),
            DeviceKind::Servo => write!(f, "servo"),
            DeviceKind::IrSensor => write!(f, "ir sensor"),
            DeviceKind::BumpSensor => write!(f, "bump sensor"),
            DeviceKind::MotorController => write!(f, "motor controller"),
        }
    }
}

/// Every message exchanged with the hardware worker.
///
/// The four device commands travel on the input and output channels.
/// [`Command::Shutdown`] is the only message accepted on the control
/// channel and is rejected on the client channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "arg")]
pub enum Command {
    /// Read the raw distance value of IR sensor `index`.
    ReadIr { index: usize },
    /// Read whether bump sensor `index` is pressed.
    ReadBump { index: usize },
    /// Drive motor `index` at a signed `speed`.
    SetMotor { index: usize, speed: i16 },
    /// Move servo `index` to `angle` degrees.
    SetServo { index: usize, angle: u8 },
    /// Stop all motors, release the bus and terminate the worker.
    Shutdown,
}

impl Command {
    /// Short tag used in log lines and error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::ReadIr { .. } => "READ_IR",
            Command::ReadBump { .. } => "READ_BUMP",
            Command::SetMotor { .. } => "SET_MOTOR",
            Command::SetServo { .. } => "SET_SERVO",
            Command::Shutdown => "SHUTDOWN",
        }
    }
}

/// The worker's answer to exactly one [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Raw IR reading, not calibrated to a physical unit.
    Distance(f32),
    /// Bump sensor state.
    Hit(bool),
    /// An actuator write was applied.
    Ack,
    /// The command failed; the worker may or may not still be running
    /// depending on the error (see [`HalError::is_fatal`]).
    Error(HalError),
}

/// A [`Command`] stamped with its sender's sequence number.
///
/// The worker echoes `seq` in the matching [`Response`], which lets a
/// client tell the answer to its current request from a late answer to one
/// it already gave up on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub command: Command,
}

impl Request {
    pub fn new(seq: u64, command: Command) -> Self {
        Self { seq, command }
    }
}

/// Unsequenced request, as used on the control channel.
impl From<Command> for Request {
    fn from(command: Command) -> Self {
        Self::new(0, command)
    }
}

/// A [`Reply`] tagged with the `seq` of the [`Request`] it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub seq: u64,
    pub reply: Reply,
}

/// Lifecycle of the hardware worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Running,
    Terminated,
}

/// Error type shared by the registry, the worker and the clients.
///
/// Serialisable so the worker can hand it back inside a [`Reply`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HalError {
    #[error("{device} index {index} is out of range")]
    IndexOutOfRange { device: DeviceKind, index: usize },

    #[error("Unrecognized command on client channel: {0}")]
    UnrecognizedCommand(String),

    #[error("Invalid control message: {0}")]
    InvalidControlMessage(String),

    #[error("Channel closed: worker endpoint is gone")]
    ChannelClosed,

    #[error("Timed out waiting for worker reply")]
    Timeout,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Hardware bus fault: {details}")]
    Bus { details: String },

    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HalError {
    /// Whether the worker terminates after raising this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HalError::UnrecognizedCommand(_)
                | HalError::InvalidControlMessage(_)
                | HalError::WorkerPanicked(_)
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor snapshot records
// ────────────────────────────────────────────────────────────────────────────

/// State of the bump switches at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BumpSensorData {
    pub left: bool,
    pub right: bool,
    /// Not wired on the stock chassis, so normally `false`.
    pub back: bool,
    pub power: bool,
}

/// IR distance readings at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrData {
    pub left: f32,
    pub right: f32,
}

impl IrData {
    /// Reading reported for a side that has not been sampled yet.
    pub const UNSAMPLED: f32 = 1000.0;
}

impl Default for IrData {
    fn default() -> Self {
        Self {
            left: Self::UNSAMPLED,
            right: Self::UNSAMPLED,
        }
    }
}

/// Bundled sensor readings produced by one input-stage step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub bump: BumpSensorData,
    pub ir: IrData,
    pub taken_at: DateTime<Utc>,
}

impl SensorSnapshot {
    /// A snapshot with default readings stamped with the current time.
    pub fn empty() -> Self {
        Self {
            bump: BumpSensorData::default(),
            ir: IrData::default(),
            taken_at: Utc::now(),
        }
    }
}
