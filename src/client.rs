use std::{sync::Arc, time::Duration};

use crate::{
    channel::{Channel, MonitorError},
    fields::PutPayload,
    transport::{Status, Transport},
    utils::get_default_wait_timeout,
    value::{DecodeError, Value},
};

/// One-call access to PVs over a shared transport.
///
/// Every operation creates a fresh [`Channel`]; nothing is cached between calls.
/// Clones share the same transport.
pub struct Client<T: Transport> {
    transport: Arc<T>,
    timeout: Duration,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<T>) -> Self {
        Client {
            transport,
            timeout: get_default_wait_timeout(),
        }
    }

    /// Override the wait timeout taken from the environment
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Create a channel that shares this client's transport and timeout
    pub fn channel(&self, name: &str) -> Channel<T> {
        Channel::new(self.transport.clone(), name).with_timeout(self.timeout)
    }

    /// Read a PV once. `Ok(None)` means no value was available.
    pub async fn get(&self, name: &str) -> Result<Option<Value>, DecodeError> {
        self.channel(name).get().await
    }

    /// Write a PV once
    pub async fn put(&self, name: &str, data: Option<PutPayload>) -> Status {
        self.channel(name).put(data).await
    }

    /// Start monitoring a PV.
    ///
    /// The subscription lasts as long as the returned channel; attach listeners
    /// to it, or use [`Client::monitor_with`] to attach one up front.
    pub fn monitor(&self, name: &str) -> Result<Channel<T>, MonitorError> {
        let channel = self.channel(name);
        channel.monitor()?;
        Ok(channel)
    }

    /// Start monitoring a PV, sending every decoded value to `on_value`.
    ///
    /// The listener is attached before subscribing, so it sees the first
    /// delivery too.
    pub fn monitor_with<F>(&self, name: &str, on_value: F) -> Result<Channel<T>, MonitorError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let channel = self.channel(name);
        channel.on_value(on_value);
        channel.monitor()?;
        Ok(channel)
    }
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Client {
            transport: self.transport.clone(),
            timeout: self.timeout,
        }
    }
}
