//! `ardhal-runtime` – the pieces that sit between the worker and a robot
//! behaviour pipeline.
//!
//! # Modules
//!
//! - [`input_stage`] – [`InputStage`][input_stage::InputStage]: one pipeline
//!   step that samples every wired sensor through an
//!   [`InputClient`][ardhal_worker::InputClient] and returns a
//!   [`SensorSnapshot`][ardhal_types::SensorSnapshot].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber, with optional OTLP span export when
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

pub mod input_stage;
pub mod telemetry;

pub use input_stage::{InputLayout, InputStage, SensorSource};
