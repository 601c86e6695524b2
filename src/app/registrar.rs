//! Pairs the running application with its discovery backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::discovery::{DiscoveryError, Registrar, ServiceInstance};

/// Registers and deregisters the application's instance.
///
/// The instance is attached once when the application starts, and both
/// calls send that same value, so the two can never disagree on identity.
/// Without a backend both calls succeed and do nothing.
pub struct AppRegistrar {
    backend: Option<Arc<dyn Registrar>>,
    instance: OnceLock<ServiceInstance>,
    registered: AtomicBool,
}

impl AppRegistrar {
    pub fn new(backend: Option<Arc<dyn Registrar>>) -> Self {
        Self {
            backend,
            instance: OnceLock::new(),
            registered: AtomicBool::new(false),
        }
    }

    /// A registrar with no backend.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// The application's instance, once it has started.
    pub fn instance(&self) -> Option<&ServiceInstance> {
        self.instance.get()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Fix the instance identity. Later calls are ignored.
    pub(crate) fn attach(&self, instance: ServiceInstance) {
        if self.instance.set(instance).is_err() {
            tracing::warn!("Service instance already attached, keeping the first");
        }
    }

    pub async fn register(&self) -> Result<(), DiscoveryError> {
        let (Some(backend), Some(instance)) = (&self.backend, self.instance.get()) else {
            return Ok(());
        };

        backend.register(instance).await?;
        self.registered.store(true, Ordering::SeqCst);
        tracing::info!(id = %instance.id, name = %instance.name, endpoints = ?instance.endpoints, "Instance registered");
        Ok(())
    }

    pub async fn deregister(&self) -> Result<(), DiscoveryError> {
        let (Some(backend), Some(instance)) = (&self.backend, self.instance.get()) else {
            return Ok(());
        };

        self.registered.store(false, Ordering::SeqCst);
        backend.deregister(instance).await?;
        tracing::info!(id = %instance.id, name = %instance.name, "Instance deregistered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{MemoryRegistrar, RegistryEvent};

    fn instance(id: &str) -> ServiceInstance {
        ServiceInstance {
            id: id.into(),
            name: "svc".into(),
            version: "v1".into(),
            metadata: Default::default(),
            endpoints: vec!["http://127.0.0.1:8080".into()],
        }
    }

    #[tokio::test]
    async fn test_without_backend_is_noop() {
        let registrar = AppRegistrar::disabled();
        registrar.attach(instance("a"));

        registrar.register().await.unwrap();
        assert!(!registrar.is_registered());
        registrar.deregister().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_and_deregister_same_identity() {
        let backend = Arc::new(MemoryRegistrar::new());
        let registrar = AppRegistrar::new(Some(backend.clone() as Arc<dyn Registrar>));
        registrar.attach(instance("a"));
        // a second attach must not change identity
        registrar.attach(instance("b"));

        registrar.register().await.unwrap();
        assert!(registrar.is_registered());
        registrar.deregister().await.unwrap();
        assert!(!registrar.is_registered());

        let events = backend.events();
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (RegistryEvent::Registered(up), RegistryEvent::Deregistered(down)) => {
                assert_eq!(up, down);
                assert_eq!(up.id, "a");
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nothing_sent_before_attach() {
        let backend = Arc::new(MemoryRegistrar::new());
        let registrar = AppRegistrar::new(Some(backend.clone() as Arc<dyn Registrar>));

        registrar.register().await.unwrap();
        registrar.deregister().await.unwrap();
        assert!(backend.events().is_empty());
    }
}
