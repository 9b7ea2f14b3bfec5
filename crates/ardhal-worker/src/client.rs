//! Request/reply facades over a client endpoint.
//!
//! Each call sends one sequence-numbered [`Request`] and waits, bounded by
//! the reply timeout, for the [`Response`] carrying the same number.  Both
//! clients take `&mut self`: an endpoint serves one caller at a time.
//!
//! A request that timed out may still be answered later.  Such a response
//! carries an older sequence number and is discarded, whether it is already
//! queued when the next call starts or arrives while that call is waiting.

use std::time::{Duration, Instant};

use ardhal_types::{Command, HalError, Reply, Request};
use tracing::warn;

use crate::channel::ClientEndpoint;

#[derive(Debug)]
struct Session {
    endpoint: ClientEndpoint,
    reply_timeout: Duration,
    last_seq: u64,
}

impl Session {
    fn new(endpoint: ClientEndpoint, reply_timeout: Duration) -> Self {
        Self {
            endpoint,
            reply_timeout,
            last_seq: 0,
        }
    }

    fn round_trip(&mut self, command: Command) -> Result<Reply, HalError> {
        // Sequence numbers start at 1; 0 marks unsequenced control traffic.
        self.last_seq += 1;
        let seq = self.last_seq;

        while let Ok(Some(stale)) = self.endpoint.try_recv() {
            warn!(seq = stale.seq, reply = ?stale.reply, "discarding late reply");
        }

        let deadline = Instant::now() + self.reply_timeout;
        self.endpoint
            .send_timeout(Request::new(seq, command), self.reply_timeout)?;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let response = self.endpoint.recv_timeout(remaining)?;
            if response.seq != seq {
                warn!(
                    expected = seq,
                    seq = response.seq,
                    reply = ?response.reply,
                    "discarding late reply"
                );
                continue;
            }
            return match response.reply {
                Reply::Error(e) => Err(e),
                reply => Ok(reply),
            };
        }
    }
}

fn unexpected(command: Command, reply: Reply) -> HalError {
    HalError::UnexpectedReply(format!("{} answered with {reply:?}", command.tag()))
}

/// Sensor-reading side of the worker.
#[derive(Debug)]
pub struct InputClient {
    session: Session,
}

impl InputClient {
    pub fn new(endpoint: ClientEndpoint, reply_timeout: Duration) -> Self {
        Self {
            session: Session::new(endpoint, reply_timeout),
        }
    }

    /// Raw distance reading of IR sensor `index`.
    ///
    /// # Errors
    ///
    /// - [`HalError::IndexOutOfRange`] / [`HalError::Bus`] reported by the worker.
    /// - [`HalError::Timeout`] when no reply arrives in time.
    /// - [`HalError::ChannelClosed`] when the worker has exited.
    pub fn ir_distance(&mut self, index: usize) -> Result<f32, HalError> {
        let command = Command::ReadIr { index };
        match self.session.round_trip(command)? {
            Reply::Distance(d) => Ok(d),
            other => Err(unexpected(command, other)),
        }
    }

    /// Whether bump sensor `index` is pressed.
    pub fn bump_hit(&mut self, index: usize) -> Result<bool, HalError> {
        let command = Command::ReadBump { index };
        match self.session.round_trip(command)? {
            Reply::Hit(hit) => Ok(hit),
            other => Err(unexpected(command, other)),
        }
    }
}

/// Actuation side of the worker.
#[derive(Debug)]
pub struct OutputClient {
    session: Session,
}

impl OutputClient {
    pub fn new(endpoint: ClientEndpoint, reply_timeout: Duration) -> Self {
        Self {
            session: Session::new(endpoint, reply_timeout),
        }
    }

    /// Drive motor `index` at `speed`; returns once the worker acknowledged.
    pub fn set_motor_speed(&mut self, index: usize, speed: i16) -> Result<(), HalError> {
        self.expect_ack(Command::SetMotor { index, speed })
    }

    /// Move servo `index` to `angle`; returns once the worker acknowledged.
    pub fn set_servo_angle(&mut self, index: usize, angle: u8) -> Result<(), HalError> {
        self.expect_ack(Command::SetServo { index, angle })
    }

    fn expect_ack(&mut self, command: Command) -> Result<(), HalError> {
        match self.session.round_trip(command)? {
            Reply::Ack => Ok(()),
            other => Err(unexpected(command, other)),
        }
    }
}
