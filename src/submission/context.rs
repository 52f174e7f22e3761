//! Devices, contexts and the asynchronous error handler.
//!
//! Device and context management proper (enumeration, capabilities,
//! allocations) lives outside this crate; here both are reduced to the
//! identity and membership checks the submission engine needs.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::{OffloadError, Result};
use crate::rt::hints::DeviceId;

/// Callback receiving asynchronous errors drained from the runtime
/// registry by `throw_asynchronous` / `wait_and_throw`.
pub type AsyncHandler = Arc<dyn Fn(Vec<OffloadError>) + Send + Sync>;

/// A compute device, reduced to its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    id: DeviceId,
}

impl Device {
    pub fn new(index: u32) -> Self {
        Self {
            id: DeviceId::new(index),
        }
    }

    /// The host device, always present.
    pub fn host() -> Self {
        Self::new(0)
    }

    pub fn with_id(id: DeviceId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }
}

/// A set of devices sharing allocations, plus an optional context-wide
/// async handler inherited by queues built against it.
#[derive(Clone)]
pub struct Context {
    devices: Vec<Device>,
    handler: Option<AsyncHandler>,
}

impl Context {
    pub fn new(device: Device) -> Self {
        Self {
            devices: vec![device],
            handler: None,
        }
    }

    pub fn with_devices(devices: Vec<Device>) -> Result<Self> {
        if devices.is_empty() {
            return Err(OffloadError::invalid_parameter(
                "context requires at least one device",
            ));
        }
        Ok(Self {
            devices,
            handler: None,
        })
    }

    pub fn with_handler(mut self, handler: AsyncHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn contains_device(&self, device: Device) -> bool {
        self.devices.contains(&device)
    }

    pub fn handler(&self) -> Option<AsyncHandler> {
        self.handler.clone()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("devices", &self.devices)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
