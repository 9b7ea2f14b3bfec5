//! Typed bidirectional channel endpoints.
//!
//! [`channel_pair`] wires two bounded [`crossbeam_channel`] queues into a
//! pair of [`Endpoint`]s, one for each side.  What one side sends the other
//! receives, in order.  Dropping an endpoint disconnects both directions,
//! so the peer sees [`HalError::ChannelClosed`] instead of blocking.

use std::time::Duration;

use ardhal_types::{HalError, Request, Response};
use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};

/// Parent side held by clients: sends requests, receives responses.
pub type ClientEndpoint = Endpoint<Request, Response>;

/// Child side held by the worker: receives requests, sends responses.
pub type WorkerEndpoint = Endpoint<Response, Request>;

/// One side of a bidirectional channel: sends `S`, receives `R`.
#[derive(Debug)]
pub struct Endpoint<S, R> {
    tx: Sender<S>,
    rx: Receiver<R>,
}

/// Create a connected pair of endpoints with `capacity` slots per direction.
///
/// A capacity of zero is raised to one; the worker never blocks on a send,
/// which needs at least one buffered slot.
pub fn channel_pair<A, B>(capacity: usize) -> (Endpoint<A, B>, Endpoint<B, A>) {
    let capacity = capacity.max(1);
    let (a_tx, a_rx) = crossbeam_channel::bounded(capacity);
    let (b_tx, b_rx) = crossbeam_channel::bounded(capacity);
    (
        Endpoint { tx: a_tx, rx: b_rx },
        Endpoint { tx: b_tx, rx: a_rx },
    )
}

impl<S, R> Endpoint<S, R> {
    /// Send, blocking while the peer's queue is full.
    pub fn send(&self, msg: S) -> Result<(), HalError> {
        self.tx.send(msg).map_err(|_| HalError::ChannelClosed)
    }

    /// Send, giving up after `timeout` if the peer's queue stays full.
    pub fn send_timeout(&self, msg: S, timeout: Duration) -> Result<(), HalError> {
        self.tx.send_timeout(msg, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => HalError::Timeout,
            SendTimeoutError::Disconnected(_) => HalError::ChannelClosed,
        })
    }

    /// Send without blocking.  Returns `Ok(false)` when the queue is full.
    pub fn try_send(&self, msg: S) -> Result<bool, HalError> {
        match self.tx.try_send(msg) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(HalError::ChannelClosed),
        }
    }

    /// Block until a message arrives.
    pub fn recv(&self) -> Result<R, HalError> {
        self.rx.recv().map_err(|_| HalError::ChannelClosed)
    }

    /// Block for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<R, HalError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => HalError::Timeout,
            RecvTimeoutError::Disconnected => HalError::ChannelClosed,
        })
    }

    /// Take a message if one is waiting.
    ///
    /// Queued messages are still delivered after the peer is gone;
    /// [`HalError::ChannelClosed`] is only returned once the queue is empty.
    pub fn try_recv(&self) -> Result<Option<R>, HalError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HalError::ChannelClosed),
        }
    }

    /// Whether a message is waiting, without consuming it.
    pub fn poll(&self) -> bool {
        !self.rx.is_empty()
    }

    pub(crate) fn receiver(&self) -> &Receiver<R> {
        &self.rx
    }
}
