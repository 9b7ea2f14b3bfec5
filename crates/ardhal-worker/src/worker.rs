//! The worker loop – single serial owner of the [`DeviceRegistry`].
//!
//! # States
//!
//! `RUNNING` is entered once the registry's bus has started.  Each
//! iteration polls, in this fixed order:
//!
//! 1. **control** – `Shutdown` ends the loop cleanly; any other message is
//!    an [`HalError::InvalidControlMessage`] and ends it with that error.
//! 2. **input** – at most one command is dispatched and answered.
//! 3. **output** – same as input.
//!
//! When none of the channels had work the loop parks in
//! [`Select::ready_timeout`] for at most `idle_wait`.  The select only
//! reports readiness and consumes nothing, so the poll order above is kept.
//!
//! # Exit paths
//!
//! Every way out of the loop (clean shutdown, protocol violation, panic in
//! device code) runs the same tail: drop all endpoints so blocked clients
//! observe [`HalError::ChannelClosed`], then [`DeviceRegistry::stop`] to zero
//! the motors and release the bus, then flip the state to `TERMINATED`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ardhal_hal::DeviceRegistry;
use ardhal_types::{Command, HalError, Reply, Response};
use crossbeam_channel::Select;
use tracing::{debug, error, info, warn};

use crate::channel::WorkerEndpoint;
use crate::dispatch::dispatch;

/// Which client a channel serves.  Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Input,
    Output,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Input => "input",
            Role::Output => "output",
        }
    }
}

struct ClientSlot {
    role: Role,
    endpoint: Option<WorkerEndpoint>,
}

/// The hardware worker.  Constructed and driven by
/// [`spawn_worker`][crate::spawn_worker]; exposed for embedding the loop in
/// a thread the caller manages.
pub struct Worker {
    registry: DeviceRegistry,
    control: Option<WorkerEndpoint>,
    clients: [ClientSlot; 2],
    idle_wait: Duration,
    terminated: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        registry: DeviceRegistry,
        control: WorkerEndpoint,
        input: WorkerEndpoint,
        output: WorkerEndpoint,
        idle_wait: Duration,
    ) -> Self {
        Self {
            registry,
            control: Some(control),
            clients: [
                ClientSlot {
                    role: Role::Input,
                    endpoint: Some(input),
                },
                ClientSlot {
                    role: Role::Output,
                    endpoint: Some(output),
                },
            ],
            idle_wait,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag set once the worker has reached `TERMINATED`.
    pub fn terminated_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminated)
    }

    /// Start the hardware bus.  Must succeed before [`run`][Self::run].
    pub fn start(&mut self) -> Result<(), HalError> {
        self.registry.start()
    }

    /// Serve the channels until shutdown or a fatal error, then stop the
    /// hardware.
    ///
    /// Returns `Ok(())` after a requested shutdown.  A fatal protocol
    /// violation or a panic in device code is returned as the error even if
    /// the stop sequence succeeded; otherwise a stop failure is returned.
    pub fn run(mut self) -> Result<(), HalError> {
        info!(idle_wait_ms = self.idle_wait.as_millis() as u64, "worker running");

        let exit = match panic::catch_unwind(AssertUnwindSafe(|| self.poll_loop())) {
            Ok(exit) => exit,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "worker loop panicked");
                Err(HalError::WorkerPanicked(message))
            }
        };

        self.close_channels();
        let stopped = self.registry.stop();
        self.terminated.store(true, Ordering::Release);

        match (exit, stopped) {
            (Err(e), _) => {
                error!(error = %e, "worker terminated with error");
                Err(e)
            }
            (Ok(()), Err(e)) => {
                error!(error = %e, "worker terminated but hardware stop failed");
                Err(e)
            }
            (Ok(()), Ok(())) => {
                info!("worker terminated");
                Ok(())
            }
        }
    }

    fn poll_loop(&mut self) -> Result<(), HalError> {
        loop {
            if let Some(exit) = self.poll_control() {
                return exit;
            }

            let mut busy = false;
            for slot in self.clients.iter_mut() {
                busy |= service(&mut self.registry, slot)?;
            }

            if !busy {
                self.idle();
            }
        }
    }

    /// `Some` when the loop must end.
    fn poll_control(&mut self) -> Option<Result<(), HalError>> {
        let Some(control) = self.control.as_ref() else {
            return Some(Ok(()));
        };
        match control.try_recv().map(|r| r.map(|request| request.command)) {
            Ok(None) => None,
            Ok(Some(Command::Shutdown)) => {
                info!("shutdown requested");
                Some(Ok(()))
            }
            Ok(Some(other)) => {
                error!(cmd = other.tag(), "invalid message on control channel");
                Some(Err(HalError::InvalidControlMessage(
                    other.tag().to_string(),
                )))
            }
            Err(_) => {
                warn!("control endpoint dropped; shutting down");
                Some(Ok(()))
            }
        }
    }

    fn idle(&self) {
        let mut select = Select::new();
        if let Some(control) = &self.control {
            select.recv(control.receiver());
        }
        for slot in &self.clients {
            if let Some(endpoint) = &slot.endpoint {
                select.recv(endpoint.receiver());
            }
        }
        let _ = select.ready_timeout(self.idle_wait);
    }

    fn close_channels(&mut self) {
        self.control = None;
        for slot in self.clients.iter_mut() {
            slot.endpoint = None;
        }
    }
}

/// Dispatch at most one command from `slot`.  Returns whether a command was
/// handled, or the fatal error that must end the loop.
fn service(registry: &mut DeviceRegistry, slot: &mut ClientSlot) -> Result<bool, HalError> {
    let channel = slot.role.as_str();
    let Some(endpoint) = slot.endpoint.as_ref() else {
        return Ok(false);
    };

    let request = match endpoint.try_recv() {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(false),
        Err(_) => {
            info!(channel, "client disconnected");
            slot.endpoint = None;
            return Ok(false);
        }
    };

    let command = request.command;
    debug!(channel, seq = request.seq, cmd = command.tag(), ?command, "dispatching");
    let reply = dispatch(registry, command);

    let fatal = match &reply {
        Reply::Error(e) if e.is_fatal() => Some(e.clone()),
        Reply::Error(e) => {
            warn!(channel, cmd = command.tag(), error = %e, "command failed");
            None
        }
        _ => None,
    };

    let response = Response {
        seq: request.seq,
        reply,
    };
    match endpoint.try_send(response) {
        Ok(true) => {}
        Ok(false) => warn!(channel, "reply queue full; client abandoned earlier replies"),
        Err(_) => {
            info!(channel, "client disconnected before reply");
            slot.endpoint = None;
        }
    }

    match fatal {
        Some(e) => {
            error!(channel, error = %e, "protocol violation on client channel");
            Err(e)
        }
        None => Ok(true),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
