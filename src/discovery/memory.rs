//! In-process registrar.
//!
//! Keeps registered instances in a map and remembers every call in order.
//! Useful for embedding the scaffold without etcd and for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DiscoveryError, Registrar, ServiceInstance};

/// A registrar call, as recorded by [`MemoryRegistrar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered(ServiceInstance),
    Deregistered(ServiceInstance),
}

#[derive(Debug, Default)]
pub struct MemoryRegistrar {
    instances: Mutex<HashMap<String, ServiceInstance>>,
    events: Mutex<Vec<RegistryEvent>>,
}

impl MemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently registered instances.
    pub fn instances(&self) -> Vec<ServiceInstance> {
        self.instances
            .lock()
            .expect("memory registrar poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Every register/deregister call so far.
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events.lock().expect("memory registrar poisoned").clone()
    }
}

#[async_trait]
impl Registrar for MemoryRegistrar {
    async fn register(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        self.instances
            .lock()
            .expect("memory registrar poisoned")
            .insert(instance.id.clone(), instance.clone());
        self.events
            .lock()
            .expect("memory registrar poisoned")
            .push(RegistryEvent::Registered(instance.clone()));
        Ok(())
    }

    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        self.instances
            .lock()
            .expect("memory registrar poisoned")
            .remove(&instance.id);
        self.events
            .lock()
            .expect("memory registrar poisoned")
            .push(RegistryEvent::Deregistered(instance.clone()));
        Ok(())
    }
}
