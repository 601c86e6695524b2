//! etcd-backed registrar.
//!
//! Each instance lives at `<namespace>/<name>/<id>` as a JSON value bound to a
//! lease. A background task keeps the lease alive and puts the key back under
//! a fresh lease if the old one is lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, GetOptions, PutOptions};
use tokio::task::JoinHandle;

use super::backoff::Backoff;
use super::{DiscoveryError, Registrar, ServiceInstance};
use crate::lifecycle::{Shutdown, ShutdownSignal};

/// Key prefix shared by every registered service.
pub const DEFAULT_NAMESPACE: &str = "/microservices";

/// Connect to the etcd cluster.
pub async fn connect(endpoints: &[String]) -> Result<Client, DiscoveryError> {
    let options = ConnectOptions::new()
        .with_connect_timeout(Duration::from_secs(5))
        .with_keep_alive(Duration::from_secs(30), Duration::from_secs(10));

    let client = Client::connect(endpoints, Some(options))
        .await
        .map_err(DiscoveryError::Connect)?;

    tracing::info!(endpoints = ?endpoints, "Connected to etcd");
    Ok(client)
}

/// List every instance stored under `prefix`. Undecodable values are skipped.
pub async fn list_instances(
    client: &mut Client,
    prefix: &str,
) -> Result<Vec<ServiceInstance>, DiscoveryError> {
    let response = client
        .get(prefix, Some(GetOptions::new().with_prefix()))
        .await?;

    let mut instances = Vec::with_capacity(response.kvs().len());
    for kv in response.kvs() {
        match serde_json::from_slice::<ServiceInstance>(kv.value()) {
            Ok(instance) => instances.push(instance),
            Err(e) => tracing::debug!(error = %e, "Skipping undecodable instance"),
        }
    }
    Ok(instances)
}

struct Registration {
    lease_id: Arc<AtomicI64>,
    shutdown: Shutdown,
    heartbeat: JoinHandle<()>,
}

/// Registrar writing instances to etcd.
pub struct EtcdRegistrar {
    client: Client,
    namespace: String,
    ttl_secs: i64,
    registrations: Mutex<HashMap<String, Registration>>,
}

impl EtcdRegistrar {
    pub fn new(client: Client, ttl: Duration) -> Self {
        Self {
            client,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl_secs: ttl.as_secs().max(1) as i64,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Use a key prefix other than [`DEFAULT_NAMESPACE`].
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn key(&self, instance: &ServiceInstance) -> String {
        instance_key(&self.namespace, instance)
    }

    fn take_registration(&self, key: &str) -> Option<Registration> {
        self.registrations
            .lock()
            .expect("registration map poisoned")
            .remove(key)
    }
}

fn instance_key(namespace: &str, instance: &ServiceInstance) -> String {
    format!(
        "{}/{}/{}",
        namespace.trim_end_matches('/'),
        instance.name,
        instance.id
    )
}

#[async_trait]
impl Registrar for EtcdRegistrar {
    async fn register(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        let key = self.key(instance);
        let value = serde_json::to_string(instance)?;

        let mut client = self.client.clone();
        let lease = put_with_lease(&mut client, &key, &value, self.ttl_secs).await?;

        let lease_id = Arc::new(AtomicI64::new(lease));
        let shutdown = Shutdown::new();
        let heartbeat = tokio::spawn(heartbeat(
            client,
            key.clone(),
            value,
            self.ttl_secs,
            lease_id.clone(),
            shutdown.subscribe(),
        ));

        let previous = self
            .registrations
            .lock()
            .expect("registration map poisoned")
            .insert(
                key.clone(),
                Registration {
                    lease_id,
                    shutdown,
                    heartbeat,
                },
            );
        if let Some(previous) = previous {
            previous.shutdown.trigger();
        }

        tracing::info!(key = %key, lease = lease, "Service registered with etcd");
        Ok(())
    }

    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        let key = self.key(instance);
        let mut client = self.client.clone();

        let lease = match self.take_registration(&key) {
            Some(registration) => {
                registration.shutdown.trigger();
                let _ = registration.heartbeat.await;
                Some(registration.lease_id.load(Ordering::SeqCst))
            }
            None => None,
        };

        client.delete(key.as_str(), None).await?;
        if let Some(lease) = lease {
            if let Err(e) = client.lease_revoke(lease).await {
                tracing::warn!(key = %key, lease = lease, error = %e, "Failed to revoke lease");
            }
        }

        tracing::info!(key = %key, "Service deregistered from etcd");
        Ok(())
    }
}

async fn put_with_lease(
    client: &mut Client,
    key: &str,
    value: &str,
    ttl_secs: i64,
) -> Result<i64, DiscoveryError> {
    let lease = client.lease_grant(ttl_secs, None).await?.id();
    client
        .put(key, value, Some(PutOptions::new().with_lease(lease)))
        .await?;
    Ok(lease)
}

enum LeaseEnd {
    Stopped,
    Lost,
}

/// Keep the lease alive; re-register when it is lost.
async fn heartbeat(
    mut client: Client,
    key: String,
    value: String,
    ttl_secs: i64,
    lease_id: Arc<AtomicI64>,
    signal: ShutdownSignal,
) {
    let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(10));

    loop {
        let lease = lease_id.load(Ordering::SeqCst);
        match keep_lease(&mut client, lease, ttl_secs, signal.clone()).await {
            Ok(LeaseEnd::Stopped) => return,
            Ok(LeaseEnd::Lost) => {
                tracing::warn!(key = %key, lease = lease, "Lease expired, re-registering");
            }
            Err(e) => {
                tracing::warn!(key = %key, lease = lease, error = %e, "Keep-alive failed, re-registering");
            }
        }

        loop {
            let delay = backoff.next_delay();
            tokio::select! {
                _ = signal.clone().recv() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let attempt = signal
                .clone()
                .or_stopped(put_with_lease(&mut client, &key, &value, ttl_secs))
                .await;
            let Some(attempt) = attempt else {
                return;
            };

            match attempt {
                Ok(lease) => {
                    lease_id.store(lease, Ordering::SeqCst);
                    backoff.reset();
                    tracing::info!(key = %key, lease = lease, "Service re-registered with etcd");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        attempt = backoff.attempt(),
                        error = %e,
                        "Re-registration failed"
                    );
                }
            }
        }
    }
}

async fn keep_lease(
    client: &mut Client,
    lease: i64,
    ttl_secs: i64,
    signal: ShutdownSignal,
) -> Result<LeaseEnd, etcd_client::Error> {
    // Every etcd round trip races the signal so a stalled connection never
    // holds up deregistration.
    let Some(opened) = signal.clone().or_stopped(client.lease_keep_alive(lease)).await else {
        return Ok(LeaseEnd::Stopped);
    };
    let (mut keeper, mut responses) = opened?;
    let mut ticker = tokio::time::interval(Duration::from_secs((ttl_secs / 3).max(1) as u64));

    loop {
        tokio::select! {
            _ = signal.clone().recv() => return Ok(LeaseEnd::Stopped),
            _ = ticker.tick() => {}
        }

        let renewal = signal
            .clone()
            .or_stopped(async {
                keeper.keep_alive().await?;
                Ok::<_, etcd_client::Error>(responses.message().await?)
            })
            .await;

        match renewal {
            None => return Ok(LeaseEnd::Stopped),
            Some(response) => match response? {
                Some(response) if response.ttl() > 0 => {}
                _ => return Ok(LeaseEnd::Lost),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> ServiceInstance {
        ServiceInstance {
            id: "7c1e".into(),
            name: "example-service".into(),
            version: "deadbeef".into(),
            metadata: Default::default(),
            endpoints: vec![],
        }
    }

    #[test]
    fn test_instance_key_layout() {
        assert_eq!(
            instance_key(DEFAULT_NAMESPACE, &instance()),
            "/microservices/example-service/7c1e"
        );
        assert_eq!(
            instance_key("/custom/", &instance()),
            "/custom/example-service/7c1e"
        );
    }
}
