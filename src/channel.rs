use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    select,
    sync::{
        self, broadcast,
        mpsc::{self, error::TrySendError},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::{
    fields::{self, PutPayload},
    transport::{MonitorCallback, Status, Subscription, Transport, TransportError},
    utils::{get_default_wait_timeout, wrapping_inplace_add},
    value::{self, DecodeError, Value},
};

/// Capacity of the queue behind [`Channel::events`]
const EVENT_CAPACITY: usize = 32;

/// Number of raw monitor deliveries a channel holds while its listeners catch
/// up. Deliveries arriving when the queue is full are dropped, with a warning.
pub const MONITOR_QUEUE_CAPACITY: usize = 256;

type ValueListener = Arc<dyn Fn(&Value) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&DecodeError) + Send + Sync>;

/// One decoded monitor delivery
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Value(Value),
    /// The delivery could not be decoded. The subscription carries on.
    Error(DecodeError),
}

/// Identifies a registered listener, for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("The channel is already monitoring its PV")]
    AlreadySubscribed,
    #[error("The channel has been unsubscribed and cannot monitor again")]
    Closed,
    #[error("{0}")]
    Transport(#[from] TransportError),
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    values: Vec<(ListenerId, ValueListener)>,
    errors: Vec<(ListenerId, ErrorListener)>,
}

impl Listeners {
    fn next_id(&mut self) -> ListenerId {
        ListenerId(wrapping_inplace_add(&mut self.next_id))
    }
    fn clear(&mut self) {
        self.values.clear();
        self.errors.clear();
    }
}

#[derive(Default)]
enum MonitorState {
    #[default]
    Unsubscribed,
    Subscribed {
        /// Keeps the transport delivering. Never shared with another channel.
        subscription: Subscription,
        /// Stops the dispatch task
        stop: CancellationToken,
    },
    Closed,
}

/// Client access to a single named process variable.
///
/// [`get`](Channel::get) and [`put`](Channel::put) are one-shot exchanges bounded
/// by the channel's wait timeout. Only one of them is in flight per channel at a
/// time; use separate channels for concurrent access.
///
/// [`monitor`](Channel::monitor) starts a subscription that lives until
/// [`unsubscribe`](Channel::unsubscribe) is called or the channel is dropped.
/// Every update is decoded and handed to the listeners registered with
/// [`on_value`](Channel::on_value) (or [`on_error`](Channel::on_error) if it could
/// not be decoded), one delivery at a time and in the order the transport
/// delivered them.
pub struct Channel<T: Transport> {
    name: String,
    transport: Arc<T>,
    timeout: Duration,
    /// Held for the duration of a get or put
    in_flight: sync::Mutex<()>,
    monitor: Mutex<MonitorState>,
    listeners: Arc<Mutex<Listeners>>,
    events: broadcast::Sender<MonitorEvent>,
}

impl<T: Transport> Channel<T> {
    /// Create a channel using the default wait timeout
    pub fn new(transport: Arc<T>, name: impl Into<String>) -> Self {
        Channel {
            name: name.into(),
            transport,
            timeout: get_default_wait_timeout(),
            in_flight: sync::Mutex::new(()),
            monitor: Mutex::new(MonitorState::Unsubscribed),
            listeners: Default::default(),
            events: broadcast::Sender::new(EVENT_CAPACITY),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read the current value.
    ///
    /// Returns `Ok(None)` if the server had no value to give: the PV was not
    /// found, the connection failed, or the wait timed out. A reply that cannot
    /// be decoded is an error.
    pub async fn get(&self) -> Result<Option<Value>, DecodeError> {
        let _guard = self.in_flight.lock().await;
        let raw = match tokio::time::timeout(
            self.timeout,
            self.transport.read(&self.name, self.timeout),
        )
        .instrument(debug_span!("get", pv = %self.name))
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                debug!("Read of '{}' failed: {e}", self.name);
                return Ok(None);
            }
            Err(_) => {
                debug!("Read of '{}' timed out after {:?}", self.name, self.timeout);
                return Ok(None);
            }
        };
        trace!("Read '{}': {raw}", self.name);
        value::decode(&raw).map(Some)
    }

    /// Write to the PV, returning the transport's status.
    ///
    /// A missing or empty payload fails immediately with [`Status::FAILED`],
    /// without contacting the server. No retries are made.
    pub async fn put(&self, data: Option<PutPayload>) -> Status {
        let fields = match fields::encode(data.as_ref()) {
            Ok(fields) => fields,
            Err(e) => {
                debug!("Not writing '{}': {e}", self.name);
                return Status::FAILED;
            }
        };
        let _guard = self.in_flight.lock().await;
        match tokio::time::timeout(
            self.timeout,
            self.transport.write(&self.name, &fields, self.timeout),
        )
        .instrument(debug_span!("put", pv = %self.name))
        .await
        {
            Ok(status) => {
                if !status.is_ok() {
                    debug!("Write to '{}' failed with status {status}", self.name);
                }
                status
            }
            Err(_) => {
                debug!("Write to '{}' timed out after {:?}", self.name, self.timeout);
                Status::FAILED
            }
        }
    }

    /// Start monitoring the PV.
    ///
    /// A channel subscribes at most once. Must be called from within a tokio
    /// runtime.
    pub fn monitor(&self) -> Result<(), MonitorError> {
        let mut state = self.monitor.lock().unwrap();
        match *state {
            MonitorState::Unsubscribed => (),
            MonitorState::Subscribed { .. } => return Err(MonitorError::AlreadySubscribed),
            MonitorState::Closed => return Err(MonitorError::Closed),
        }

        // The transport callback only queues; decoding and listeners run on the
        // dispatch task, so deliveries for this channel never overlap.
        let (raw_tx, raw_rx) = mpsc::channel(MONITOR_QUEUE_CAPACITY);
        let name = self.name.clone();
        let callback: MonitorCallback = Box::new(move |raw: &str| {
            match raw_tx.try_send(raw.to_owned()) {
                Ok(()) => (),
                Err(TrySendError::Full(_)) => {
                    warn!("Monitor queue for '{name}' is full, dropping delivery")
                }
                Err(TrySendError::Closed(_)) => {
                    trace!("Dropping delivery for '{name}': monitor has stopped")
                }
            }
        });
        let subscription = self.transport.subscribe(&self.name, callback)?;

        let stop = CancellationToken::new();
        tokio::spawn(
            dispatch(
                raw_rx,
                self.listeners.clone(),
                self.events.clone(),
                stop.clone(),
            )
            .instrument(debug_span!("monitor", pv = %self.name)),
        );
        *state = MonitorState::Subscribed { subscription, stop };
        debug!("Started monitoring '{}'", self.name);
        Ok(())
    }

    /// Is a subscription currently active?
    pub fn is_subscribed(&self) -> bool {
        matches!(
            *self.monitor.lock().unwrap(),
            MonitorState::Subscribed { .. }
        )
    }

    /// Register a listener for decoded monitor values
    pub fn on_value<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().unwrap();
        let id = listeners.next_id();
        let listener: ValueListener = Arc::new(listener);
        listeners.values.push((id, listener));
        id
    }

    /// Register a listener for monitor deliveries that failed to decode
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DecodeError) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().unwrap();
        let id = listeners.next_id();
        let listener: ErrorListener = Arc::new(listener);
        listeners.errors.push((id, listener));
        id
    }

    /// Remove a previously registered listener. Returns false if it was unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.values.len() + listeners.errors.len();
        listeners.values.retain(|(i, _)| *i != id);
        listeners.errors.retain(|(i, _)| *i != id);
        before != listeners.values.len() + listeners.errors.len()
    }

    /// Receive monitor events by awaiting instead of through listeners.
    ///
    /// Only events after this call are seen. A receiver that falls more than
    /// 32 events behind loses the oldest and gets a `Lagged` error.
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Stop monitoring and drop all listeners.
    ///
    /// Releases the transport subscription. The channel can still get and put,
    /// but can never monitor again. Calling this more than once has no effect.
    pub fn unsubscribe(&self) {
        let previous = std::mem::replace(&mut *self.monitor.lock().unwrap(), MonitorState::Closed);
        self.teardown(previous);
    }

    fn teardown(&self, state: MonitorState) {
        if let MonitorState::Subscribed { subscription, stop } = state {
            stop.cancel();
            subscription.cancel();
            debug!("Stopped monitoring '{}'", self.name);
        }
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.clear();
        }
    }
}

impl<T: Transport> Drop for Channel<T> {
    fn drop(&mut self) {
        let state = match self.monitor.get_mut() {
            Ok(state) => std::mem::take(state),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        self.teardown(state);
    }
}

impl<T: Transport> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

/// Decode queued deliveries and hand them out, one at a time, until stopped
async fn dispatch(
    mut raw_rx: mpsc::Receiver<String>,
    listeners: Arc<Mutex<Listeners>>,
    events: broadcast::Sender<MonitorEvent>,
    stop: CancellationToken,
) {
    loop {
        let raw = select! {
            biased;
            _ = stop.cancelled() => break,
            raw = raw_rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };
        trace!("Delivery: {raw}");
        let event = match value::decode(&raw) {
            Ok(value) => MonitorEvent::Value(value),
            Err(e) => {
                warn!("Could not decode monitor delivery, waiting for the next: {e}");
                MonitorEvent::Error(e)
            }
        };
        emit(&listeners, &event);
        // Nobody listening on the receiver side is fine
        let _ = events.send(event);
    }
    debug!("Monitor dispatch finished");
}

/// Call the listeners for an event, in registration order.
///
/// The listener lock is not held during the calls, so listeners may add or
/// remove listeners themselves. A listener that panics is logged and skipped;
/// the others, and later deliveries, are unaffected.
fn emit(listeners: &Mutex<Listeners>, event: &MonitorEvent) {
    match event {
        MonitorEvent::Value(value) => {
            let targets: Vec<(ListenerId, ValueListener)> = {
                let listeners = listeners.lock().unwrap();
                listeners.values.clone()
            };
            for (id, listener) in targets {
                call_listener(id, || listener(value));
            }
        }
        MonitorEvent::Error(error) => {
            let targets: Vec<(ListenerId, ErrorListener)> = {
                let listeners = listeners.lock().unwrap();
                listeners.errors.clone()
            };
            for (id, listener) in targets {
                call_listener(id, || listener(error));
            }
        }
    }
}

fn call_listener(id: ListenerId, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!("Monitor listener {id:?} panicked");
    }
}
