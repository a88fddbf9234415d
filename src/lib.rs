//! Rust client for EPICS PVAccess process variables, at the channel level.
//!
//! <div class="warning">This is an early version of this library. Interfaces may
//! change between versions until a comfortable final design is settled upon.</div>
//!
//! A [`Channel`] gives access to one named process variable (PV):
//!
//! - [`Channel::get`] reads the current value,
//! - [`Channel::put`] writes either the `value` field or a set of named fields,
//! - [`Channel::monitor`] subscribes to updates, which are handed to listeners
//!   registered with [`Channel::on_value`] or read from [`Channel::events`].
//!
//! [`Client`] wraps these as one-call operations that create a new channel each
//! time.
//!
//! The crate is separated into:
//!
//! - Decoding and rendering of values, in module [value]. The server's textual
//!   representation is not quite JSON (bare `nan` tokens, separators before
//!   closing brackets) and is repaired before it is parsed into a [`Value`].
//! - Encoding of put data into field name/value strings, in module [fields].
//! - The [`Transport`] trait that the connection to a server implements, in
//!   module [transport]. A [`transport::LoopbackTransport`] that serves PVs
//!   in-process is included; it is useful for tests and for embedding.
//!
//! ## Example
//!
//! ```
//! use pvars::{Client, PutPayload, transport::LoopbackTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = LoopbackTransport::new();
//!     transport.add_pv("calcExample", 0).unwrap();
//!     let client = Client::new(transport);
//!
//!     assert!(client.put("calcExample", Some(PutPayload::from(10))).await.is_ok());
//!     let value = client.get("calcExample").await.unwrap();
//!     assert_eq!(value.and_then(|v| v.as_i64()), Some(10));
//! }
//! ```
//!
//! ## Configuration
//!
//! `EPICS_PVA_WAIT_TIMEOUT` sets the number of seconds get and put wait for the
//! server (default 5). It is read when a [`Client`] or [`Channel`] is created.

mod channel;
mod client;
mod utils;

pub mod fields;
pub mod transport;
pub mod value;

pub use crate::channel::{
    Channel, ListenerId, MONITOR_QUEUE_CAPACITY, MonitorError, MonitorEvent,
};
pub use crate::client::Client;
pub use crate::fields::{PutPayload, Scalar};
pub use crate::transport::{Status, Transport, TransportError};
pub use crate::utils::{DEFAULT_WAIT_TIMEOUT, get_default_wait_timeout};
pub use crate::value::{DecodeError, Value};
