//! Interface between a [`Channel`](crate::Channel) and the server connection
//!
//! A [`Transport`] provides the three primitive operations a channel is built on:
//! a bounded read, a bounded write, and a subscription that hands each update to
//! a callback. Talking to a real server (session negotiation, name resolution,
//! framing) is the job of the implementation; this module only fixes the
//! contract.
//!
//! [`LoopbackTransport`] is an in-process implementation that serves PVs held in
//! memory, in the same textual dialect a server produces.

pub mod loopback;
pub use loopback::LoopbackTransport;

use std::{fmt, future::Future, time::Duration};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fields::Field;

/// Receives each raw monitor update, in delivery order
pub type MonitorCallback = Box<dyn FnMut(&str) + Send + 'static>;

/// The primitive operations needed to access process variables
pub trait Transport: Send + Sync + 'static {
    /// Read the current value of a PV as raw wire text.
    ///
    /// Implementations should give up once `timeout` has elapsed; the caller
    /// enforces the same deadline independently.
    fn read(
        &self,
        name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Write the given fields of a PV, in order.
    ///
    /// The returned status is passed back to the user unchanged.
    fn write(
        &self,
        name: &str,
        fields: &[Field],
        timeout: Duration,
    ) -> impl Future<Output = Status> + Send;

    /// Start delivering updates of a PV to `callback`.
    ///
    /// Deliveries continue until the returned [`Subscription`] is cancelled or
    /// dropped. The callback may be invoked from any thread, but never
    /// concurrently with itself.
    fn subscribe(
        &self,
        name: &str,
        callback: MonitorCallback,
    ) -> Result<Subscription, TransportError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("PV '{0}' was not found")]
    NotFound(String),
    #[error("Timed out waiting for the server")]
    Timeout,
    #[error("The connection to the server was lost")]
    Disconnected,
    #[error("The server refused the request: {0}")]
    Refused(String),
}

/// Status code of a put. Zero is success, anything else is failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    /// Failure detected on the client side, or a transport that has no better code
    pub const FAILED: Status = Status(-1);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }
    pub fn code(self) -> i32 {
        self.0
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keeps a transport subscription alive.
///
/// The transport holds a clone of the inner token (see [`Subscription::token`])
/// and stops delivering once it is cancelled. Dropping the handle cancels it.
#[derive(Debug, Default)]
pub struct Subscription {
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new() -> Self {
        Subscription::default()
    }
    /// Token for the delivering side to watch
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
