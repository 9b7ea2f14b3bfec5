//! Worker construction and the control handle.
//!
//! [`spawn_worker`] creates the three channel pairs, moves the registry onto
//! a dedicated `ardhal-worker` thread, starts the bus there and returns the
//! parent-side endpoints once the worker is `RUNNING`.  A bus that fails to
//! start is reported to the caller instead of a half-built worker.
//!
//! # Example
//!
//! ```rust
//! use ardhal_hal::{SimBus, Wiring};
//! use ardhal_worker::{InputClient, OutputClient, WorkerConfig, create_worker};
//!
//! let config = WorkerConfig { settle_delay_ms: 0, ..WorkerConfig::default() };
//! let (bus, _handle) = SimBus::new();
//! let (control, input, output) =
//!     create_worker(Box::new(bus), &Wiring::default(), &config).unwrap();
//!
//! let mut sensors = InputClient::new(input, config.reply_timeout());
//! let mut wheels = OutputClient::new(output, config.reply_timeout());
//! wheels.set_motor_speed(0, 50).unwrap();
//! assert!(!sensors.bump_hit(0).unwrap());
//!
//! control.shutdown().unwrap();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ardhal_hal::{DeviceRegistry, HardwareBus, Wiring};
use ardhal_types::{Command, HalError, WorkerState};
use tracing::{error, info, warn};

use crate::channel::{ClientEndpoint, channel_pair};
use crate::config::WorkerConfig;
use crate::worker::{Worker, panic_message};

const THREAD_NAME: &str = "ardhal-worker";

/// Build a registry from `wiring` on top of `bus` and spawn a worker for it.
pub fn create_worker(
    bus: Box<dyn HardwareBus>,
    wiring: &Wiring,
    config: &WorkerConfig,
) -> Result<(WorkerControl, ClientEndpoint, ClientEndpoint), HalError> {
    let registry = wiring.build(bus).with_settle_delay(config.settle_delay());
    spawn_worker(registry, config)
}

/// Spawn the worker thread for an already populated `registry`.
///
/// Returns `(control, input, output)`.  The input and output endpoints are
/// meant to be wrapped in [`InputClient`][crate::InputClient] and
/// [`OutputClient`][crate::OutputClient].
///
/// # Errors
///
/// - [`HalError::WorkerSpawn`] if the OS refuses to create the thread.
/// - Whatever the bus returned from `start`.
/// - [`HalError::WorkerPanicked`] if the worker died while starting.
pub fn spawn_worker(
    registry: DeviceRegistry,
    config: &WorkerConfig,
) -> Result<(WorkerControl, ClientEndpoint, ClientEndpoint), HalError> {
    let capacity = config.channel_capacity;
    let (control, control_child) = channel_pair(capacity);
    let (input, input_child) = channel_pair(capacity);
    let (output, output_child) = channel_pair(capacity);

    let mut worker = Worker::new(
        registry,
        control_child,
        input_child,
        output_child,
        config.idle_wait(),
    );
    let terminated = worker.terminated_flag();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), HalError>>(1);

    let handle = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            if let Err(e) = worker.start() {
                error!(error = %e, "hardware bus failed to start");
                let _ = ready_tx.send(Err(e.clone()));
                return Err(e);
            }
            let _ = ready_tx.send(Ok(()));
            worker.run()
        })
        .map_err(|e| HalError::WorkerSpawn(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = handle.join();
            terminated.store(true, Ordering::Release);
            return Err(e);
        }
        Err(_) => {
            let message = match handle.join() {
                Err(payload) => panic_message(payload.as_ref()),
                Ok(_) => "worker exited before reporting readiness".to_string(),
            };
            terminated.store(true, Ordering::Release);
            return Err(HalError::WorkerPanicked(message));
        }
    }

    info!(thread = THREAD_NAME, "worker started");
    Ok((
        WorkerControl {
            control,
            handle: Some(handle),
            terminated,
            shutdown_timeout: config.shutdown_timeout(),
        },
        input,
        output,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Control handle
// ────────────────────────────────────────────────────────────────────────────

/// Parent side of the control channel plus ownership of the worker thread.
///
/// Dropping the handle without calling [`shutdown`][Self::shutdown] still
/// requests a shutdown and waits (bounded) for the worker to stop the
/// hardware.
pub struct WorkerControl {
    control: ClientEndpoint,
    handle: Option<JoinHandle<Result<(), HalError>>>,
    terminated: Arc<AtomicBool>,
    shutdown_timeout: Duration,
}

impl WorkerControl {
    /// Current lifecycle state of the worker.
    pub fn state(&self) -> WorkerState {
        if self.terminated.load(Ordering::Acquire) {
            WorkerState::Terminated
        } else {
            WorkerState::Running
        }
    }

    /// Send a raw message on the control channel.
    ///
    /// Anything other than [`Command::Shutdown`] makes the worker stop the
    /// hardware and exit with [`HalError::InvalidControlMessage`].
    pub fn send(&self, message: Command) -> Result<(), HalError> {
        self.control.send(message.into())
    }

    /// Request shutdown and wait for the worker to stop the hardware.
    ///
    /// Returns the worker's exit result: `Ok(())` for a clean shutdown, the
    /// fatal error if the worker had already died of one, or
    /// [`HalError::Timeout`] if it did not exit within the shutdown timeout.
    pub fn shutdown(mut self) -> Result<(), HalError> {
        self.finish()
    }

    /// Wait for the worker to exit on its own, without requesting shutdown.
    pub fn join(mut self) -> Result<(), HalError> {
        match self.handle.take() {
            Some(handle) => join_result(handle.join()),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> Result<(), HalError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match self.control.send(Command::Shutdown.into()) {
            Ok(()) => info!("shutdown sent to worker"),
            // Already gone; the join below reports why.
            Err(_) => warn!("worker control channel already closed"),
        }
        join_result(join_timeout(handle, self.shutdown_timeout)?)
    }
}

impl Drop for WorkerControl {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        if let Err(e) = self.finish() {
            error!(error = %e, "worker did not shut down cleanly");
        }
    }
}

type ThreadResult = std::thread::Result<Result<(), HalError>>;

fn join_result(joined: ThreadResult) -> Result<(), HalError> {
    match joined {
        Ok(exit) => exit,
        Err(payload) => Err(HalError::WorkerPanicked(panic_message(payload.as_ref()))),
    }
}

/// Join `handle`, giving up after `timeout`.
///
/// A helper thread performs the blocking join so the caller can wait on a
/// channel with a deadline.  On timeout the helper is left behind and is
/// reaped when the worker eventually exits.
fn join_timeout(
    handle: JoinHandle<Result<(), HalError>>,
    timeout: Duration,
) -> Result<ThreadResult, HalError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(handle.join());
    });
    match rx.recv_timeout(timeout) {
        Ok(joined) => Ok(joined),
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
            error!(?timeout, "worker did not exit in time");
            Err(HalError::Timeout)
        }
        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
            Err(HalError::WorkerPanicked("join helper vanished".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{InputClient, OutputClient};
    use ardhal_hal::{BusEvent, SimBus, SimBusHandle, WriteTarget};
    use ardhal_types::{DeviceKind, Pin, Reply, Request, Response};
    use std::time::Instant;

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            settle_delay_ms: 10,
            idle_wait_ms: 1,
            reply_timeout_ms: 500,
            shutdown_timeout_ms: 2_000,
            channel_capacity: 4,
        }
    }

    fn two_motors_one_bump() -> (DeviceRegistry, SimBusHandle) {
        let (bus, handle) = SimBus::new();
        let mut registry = DeviceRegistry::new(Box::new(bus))
            .with_settle_delay(fast_config().settle_delay());
        registry.add_motor_controller(18, 19);
        registry.add_motor();
        registry.add_motor();
        registry.add_bump_sensor(2);
        (registry, handle)
    }

    #[test]
    fn scenario_two_motors_one_bump_sensor() {
        let config = fast_config();
        let (registry, handle) = two_motors_one_bump();
        handle.set_digital(2, true);
        let (control, input, output) = spawn_worker(registry, &config).unwrap();
        assert_eq!(control.state(), WorkerState::Running);

        let mut sensors = InputClient::new(input, config.reply_timeout());
        let mut wheels = OutputClient::new(output, config.reply_timeout());

        wheels.set_motor_speed(0, 50).unwrap();
        wheels.set_motor_speed(1, -50).unwrap();
        assert!(sensors.bump_hit(0).unwrap());
        assert_eq!(
            wheels.set_motor_speed(2, 0).unwrap_err(),
            HalError::IndexOutOfRange {
                device: DeviceKind::Motor,
                index: 2
            }
        );

        // The index error did not take the worker down.
        wheels.set_motor_speed(0, 10).unwrap();
        control.shutdown().unwrap();
    }

    #[test]
    fn sequential_output_round_trips_are_one_to_one() {
        let config = fast_config();
        let (bus, _handle) = SimBus::new();
        let mut registry = DeviceRegistry::new(Box::new(bus)).with_settle_delay(Duration::ZERO);
        registry.add_servo(9);
        let (control, _input, output) = spawn_worker(registry, &config).unwrap();

        // Raw endpoint: every request must see exactly one reply, and no
        // extra reply may be waiting afterwards.
        for counter in 1..=200u64 {
            let command = Command::SetServo {
                index: 0,
                angle: (counter % 180) as u8,
            };
            output.send(Request::new(counter, command)).unwrap();
            assert_eq!(
                output.recv_timeout(config.reply_timeout()).unwrap(),
                Response {
                    seq: counter,
                    reply: Reply::Ack
                }
            );
            assert_eq!(output.try_recv().unwrap(), None);
        }
        control.shutdown().unwrap();
    }

    #[test]
    fn sequential_input_round_trips_answer_their_own_index() {
        const SENSORS: usize = 8;
        let config = fast_config();
        let (bus, handle) = SimBus::new();
        let mut registry = DeviceRegistry::new(Box::new(bus)).with_settle_delay(Duration::ZERO);
        for pin in 0..SENSORS as Pin {
            registry.add_ir_sensor(pin);
            handle.set_analog(pin, 100 + u16::from(pin));
        }
        let (control, input, _output) = spawn_worker(registry, &config).unwrap();

        for counter in 1..=200u64 {
            let index = counter as usize % SENSORS;
            input
                .send(Request::new(counter, Command::ReadIr { index }))
                .unwrap();
            let response = input.recv_timeout(config.reply_timeout()).unwrap();
            assert_eq!(response.seq, counter);
            assert_eq!(response.reply, Reply::Distance(100.0 + index as f32));
            assert_eq!(input.try_recv().unwrap(), None);
        }
        control.shutdown().unwrap();
    }

    /// Sim bus whose analog reads of one pin take longer than a reply
    /// timeout.
    struct SlowPinBus {
        inner: SimBus,
        slow_pin: Pin,
        delay: Duration,
    }

    impl HardwareBus for SlowPinBus {
        fn start(&mut self) -> Result<(), HalError> {
            self.inner.start()
        }
        fn stop(&mut self) -> Result<(), HalError> {
            self.inner.stop()
        }
        fn analog_read(&mut self, pin: Pin) -> Result<u16, HalError> {
            if pin == self.slow_pin {
                thread::sleep(self.delay);
            }
            self.inner.analog_read(pin)
        }
        fn digital_read(&mut self, pin: Pin) -> Result<bool, HalError> {
            self.inner.digital_read(pin)
        }
        fn write(&mut self, target: WriteTarget, value: i32) -> Result<(), HalError> {
            self.inner.write(target, value)
        }
    }

    #[test]
    fn slow_read_answer_is_not_returned_for_next_sensor() {
        let config = WorkerConfig {
            reply_timeout_ms: 80,
            ..fast_config()
        };
        let (sim, handle) = SimBus::new();
        handle.set_analog(0, 111);
        handle.set_analog(1, 999);
        let bus = SlowPinBus {
            inner: sim,
            slow_pin: 0,
            delay: Duration::from_millis(100),
        };
        let mut registry = DeviceRegistry::new(Box::new(bus)).with_settle_delay(Duration::ZERO);
        registry.add_ir_sensor(0);
        registry.add_ir_sensor(1);
        let (control, input, _output) = spawn_worker(registry, &config).unwrap();

        let mut sensors = InputClient::new(input, config.reply_timeout());
        assert_eq!(sensors.ir_distance(0).unwrap_err(), HalError::Timeout);
        assert_eq!(sensors.ir_distance(1).unwrap(), 999.0);
        assert_eq!(sensors.ir_distance(1).unwrap(), 999.0);
        control.shutdown().unwrap();
    }

    #[test]
    fn shutdown_zeroes_motors_and_terminates_promptly() {
        let config = fast_config();
        let (registry, handle) = two_motors_one_bump();
        let (control, input, output) = spawn_worker(registry, &config).unwrap();
        let mut wheels = OutputClient::new(output, config.reply_timeout());
        wheels.set_motor_speed(0, 90).unwrap();
        wheels.set_motor_speed(1, 90).unwrap();

        let started = Instant::now();
        control.shutdown().unwrap();
        assert!(started.elapsed() < config.shutdown_timeout());

        let events = handle.events();
        assert_eq!(events.last(), Some(&BusEvent::Stop));
        let n = events.len();
        assert!(
            events[n - 3..n - 1]
                .iter()
                .all(|e| matches!(e, BusEvent::Write { value: 0, .. }))
        );

        // No replies after shutdown: the endpoints are closed.
        assert_eq!(wheels.set_motor_speed(0, 1).unwrap_err(), HalError::ChannelClosed);
        let mut sensors = InputClient::new(input, config.reply_timeout());
        assert_eq!(sensors.bump_hit(0).unwrap_err(), HalError::ChannelClosed);
    }

    #[test]
    fn shutdown_on_client_channel_is_fatal_and_stops_motors() {
        let config = fast_config();
        let (registry, handle) = two_motors_one_bump();
        let (control, _input, output) = spawn_worker(registry, &config).unwrap();

        output
            .send(Command::SetMotor { index: 0, speed: 70 }.into())
            .unwrap();
        assert_eq!(output.recv().unwrap().reply, Reply::Ack);

        output.send(Command::Shutdown.into()).unwrap();
        assert_eq!(
            output.recv_timeout(config.reply_timeout()).unwrap().reply,
            Reply::Error(HalError::UnrecognizedCommand("SHUTDOWN".into()))
        );
        assert_eq!(output.recv().unwrap_err(), HalError::ChannelClosed);

        assert_eq!(
            control.join().unwrap_err(),
            HalError::UnrecognizedCommand("SHUTDOWN".into())
        );
        assert_eq!(handle.writes().last().map(|(_, v)| *v), Some(0));
        assert!(!handle.is_running());
    }

    #[test]
    fn invalid_control_message_terminates_worker() {
        let config = fast_config();
        let (registry, handle) = two_motors_one_bump();
        let (control, input, _output) = spawn_worker(registry, &config).unwrap();

        control.send(Command::ReadBump { index: 0 }).unwrap();
        let mut sensors = InputClient::new(input, config.reply_timeout());
        // The blocked client fails instead of hanging.
        let start = Instant::now();
        while sensors.bump_hit(0).is_ok() {
            assert!(start.elapsed() < Duration::from_secs(2));
        }
        assert_eq!(
            control.join().unwrap_err(),
            HalError::InvalidControlMessage("READ_BUMP".into())
        );
        assert!(!handle.is_running());
    }

    #[test]
    fn bus_start_failure_is_reported() {
        let (bus, handle) = SimBus::new();
        handle.inject_fault("no device on /dev/ttyACM0");
        let registry = DeviceRegistry::new(Box::new(bus));

        let err = spawn_worker(registry, &fast_config()).err().unwrap();
        assert!(matches!(err, HalError::Bus { .. }));
    }

    #[test]
    fn dropping_control_handle_stops_hardware() {
        let config = fast_config();
        let (registry, handle) = two_motors_one_bump();
        let (control, _input, output) = spawn_worker(registry, &config).unwrap();
        let mut wheels = OutputClient::new(output, config.reply_timeout());
        wheels.set_motor_speed(1, 33).unwrap();

        drop(control);
        assert!(!handle.is_running());
        assert_eq!(handle.writes().last().map(|(_, v)| *v), Some(0));
    }

    #[test]
    fn create_worker_uses_wiring() {
        let config = fast_config();
        let (bus, handle) = SimBus::new();
        handle.set_analog(1, 640);
        let (control, input, _output) =
            create_worker(Box::new(bus), &Wiring::default(), &config).unwrap();

        let mut sensors = InputClient::new(input, config.reply_timeout());
        assert!((sensors.ir_distance(1).unwrap() - 640.0).abs() < f32::EPSILON);
        assert!(sensors.bump_hit(2).is_ok());
        assert!(sensors.bump_hit(3).is_err());
        control.shutdown().unwrap();
    }
}
