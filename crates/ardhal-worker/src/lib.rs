//! `ardhal-worker` – the thread that owns the hardware.
//!
//! A single worker thread holds the [`DeviceRegistry`][ardhal_hal::DeviceRegistry]
//! and therefore the bus.  Everything else talks to it over three typed
//! channel pairs:
//!
//! | Channel | Traffic |
//! |---|---|
//! | control | [`Command::Shutdown`][ardhal_types::Command::Shutdown] only |
//! | input | sensor reads issued through [`InputClient`] |
//! | output | actuator writes issued through [`OutputClient`] |
//!
//! # Modules
//!
//! - [`channel`] – [`Endpoint`][channel::Endpoint]: one side of a
//!   bidirectional crossbeam channel pair.
//! - [`dispatch`] – maps a [`Command`][ardhal_types::Command] onto the
//!   registry and produces the [`Reply`][ardhal_types::Reply].
//! - [`worker`] – the fixed-order poll loop and its shutdown paths.
//! - [`client`] – [`InputClient`] / [`OutputClient`] request/reply facades.
//! - [`bootstrap`] – [`create_worker`] / [`spawn_worker`] and the
//!   [`WorkerControl`] handle.
//! - [`config`] – [`WorkerConfig`] timing and capacity knobs.

pub mod bootstrap;
pub mod channel;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod worker;

pub use bootstrap::{WorkerControl, create_worker, spawn_worker};
pub use channel::{ClientEndpoint, Endpoint, WorkerEndpoint, channel_pair};
pub use client::{InputClient, OutputClient};
pub use config::WorkerConfig;
