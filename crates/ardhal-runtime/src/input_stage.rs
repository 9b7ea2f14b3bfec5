//! Sensor sampling stage.
//!
//! Each [`InputStage::step`] reads every wired bump and IR sensor once and
//! packs the readings into a fresh [`SensorSnapshot`].  Which sensor index
//! feeds which field is described by an [`InputLayout`]; the default
//! matches the stock robot wiring (bumpers 0/1 left/right, 2 power switch,
//! IR 0/1 left/right, no rear bumper).

use ardhal_types::{BumpSensorData, HalError, IrData, SensorSnapshot};
use ardhal_worker::InputClient;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Anything that can answer sensor reads by index.
pub trait SensorSource {
    fn ir_distance(&mut self, index: usize) -> Result<f32, HalError>;
    fn bump_hit(&mut self, index: usize) -> Result<bool, HalError>;
}

impl SensorSource for InputClient {
    fn ir_distance(&mut self, index: usize) -> Result<f32, HalError> {
        InputClient::ir_distance(self, index)
    }

    fn bump_hit(&mut self, index: usize) -> Result<bool, HalError> {
        InputClient::bump_hit(self, index)
    }
}

/// Registry indices feeding each snapshot field.  `None` leaves the field
/// at its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLayout {
    pub bump_left: Option<usize>,
    pub bump_right: Option<usize>,
    pub bump_back: Option<usize>,
    pub bump_power: Option<usize>,
    pub ir_left: Option<usize>,
    pub ir_right: Option<usize>,
}

impl Default for InputLayout {
    fn default() -> Self {
        Self {
            bump_left: Some(0),
            bump_right: Some(1),
            bump_back: None,
            bump_power: Some(2),
            ir_left: Some(0),
            ir_right: Some(1),
        }
    }
}

/// Pipeline stage turning worker reads into [`SensorSnapshot`]s.
pub struct InputStage<S: SensorSource> {
    source: S,
    layout: InputLayout,
}

impl<S: SensorSource> InputStage<S> {
    pub fn new(source: S) -> Self {
        Self::with_layout(source, InputLayout::default())
    }

    pub fn with_layout(source: S, layout: InputLayout) -> Self {
        Self { source, layout }
    }

    pub fn layout(&self) -> &InputLayout {
        &self.layout
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Sample every mapped sensor once.
    ///
    /// The first failing read aborts the step and is returned; a partial
    /// snapshot is never produced.
    pub fn step(&mut self) -> Result<SensorSnapshot, HalError> {
        let layout = &self.layout;
        let source = &mut self.source;

        let mut bump = BumpSensorData::default();
        for (slot, index) in [
            (&mut bump.left, layout.bump_left),
            (&mut bump.right, layout.bump_right),
            (&mut bump.back, layout.bump_back),
            (&mut bump.power, layout.bump_power),
        ] {
            if let Some(index) = index {
                *slot = source.bump_hit(index).inspect_err(|e| {
                    warn!(index, error = %e, "bump read failed");
                })?;
            }
        }

        let mut ir = IrData::default();
        for (slot, index) in [(&mut ir.left, layout.ir_left), (&mut ir.right, layout.ir_right)] {
            if let Some(index) = index {
                *slot = source.ir_distance(index).inspect_err(|e| {
                    warn!(index, error = %e, "ir read failed");
                })?;
            }
        }

        let snapshot = SensorSnapshot {
            bump,
            ir,
            taken_at: Utc::now(),
        };
        debug!(?snapshot.bump, ?snapshot.ir, "sensor snapshot");
        Ok(snapshot)
    }
}
