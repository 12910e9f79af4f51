//! Listener lifecycle registry
//!
//! The network library that delivers messages is an external collaborator;
//! this module owns only the lifecycle bookkeeping: which ports have a
//! listener, starting one through an injected factory, and shutting them
//! down again. There is no ambient global state; an application owns its
//! registry alongside the pipeline the listeners feed.

use std::collections::HashMap;

use tracing::info;

use crate::error::{MonitorError, Result};

/// Handle to a running listener.
///
/// Dropping a handle does not stop the listener; shutdown is explicit so
/// the registry can drain deliberately.
pub trait ListenerHandle: Send {
    /// Stop the listener and release its port.
    fn shutdown(self: Box<Self>);
}

/// Creates listeners bound to a port.
///
/// The factory wires message delivery to whatever handler it closed over;
/// the registry never sees messages, only handles.
pub trait ListenerFactory {
    /// Bind a listener on `port`.
    fn bind(&self, port: u16) -> Result<Box<dyn ListenerHandle>>;
}

/// Tracks the listeners an application has running, one per port.
pub struct ListenerRegistry<F: ListenerFactory> {
    factory: F,
    active: HashMap<u16, Box<dyn ListenerHandle>>,
}

impl<F: ListenerFactory> ListenerRegistry<F> {
    /// Create an empty registry around a listener factory
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            active: HashMap::new(),
        }
    }

    /// Start a listener on `port`.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener is already running on the port, or
    /// if the factory fails to bind.
    pub fn start(&mut self, port: u16) -> Result<()> {
        if self.active.contains_key(&port) {
            return Err(MonitorError::ListenerAlreadyRunning(port));
        }
        let handle = self.factory.bind(port)?;
        self.active.insert(port, handle);
        info!("listening on port {}", port);
        Ok(())
    }

    /// Stop the listener on `port`.
    ///
    /// # Errors
    ///
    /// Returns an error if no listener is running on the port.
    pub fn stop(&mut self, port: u16) -> Result<()> {
        let handle = self
            .active
            .remove(&port)
            .ok_or(MonitorError::ListenerNotFound(port))?;
        handle.shutdown();
        info!("stopped listening on port {}", port);
        Ok(())
    }

    /// Stop every running listener.
    pub fn stop_all(&mut self) {
        for (port, handle) in self.active.drain() {
            handle.shutdown();
            info!("stopped listening on port {}", port);
        }
    }

    /// Ports with a running listener, sorted
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.active.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Whether a listener is running on `port`
    pub fn is_running(&self, port: u16) -> bool {
        self.active.contains_key(&port)
    }

    /// Number of running listeners
    pub fn count(&self) -> usize {
        self.active.len()
    }
}
