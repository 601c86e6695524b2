//! Mutual exclusion for periodic jobs across service instances.
//!
//! Every instance of a service registers under the same discovery prefix.
//! The instances whose ids sort first (up to `workers` of them) hold the
//! job slots; the rest stand by. Membership is re-read every `interval`,
//! so a slot moves to another instance when its holder disappears.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use etcd_client::Client;
use tokio::task::JoinHandle;

use crate::app::AppRegistrar;
use crate::discovery;
use crate::lifecycle::{Shutdown, ShutdownSignal};

const REGISTRATION_POLL: Duration = Duration::from_millis(100);

/// Tracks whether this instance may run mutually exclusive jobs.
pub struct MutexJobUtil {
    name: String,
    holder: Arc<AtomicBool>,
    shutdown: Shutdown,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MutexJobUtil {
    /// Start refreshing slot ownership in the background.
    ///
    /// `name` is the discovery prefix (`microservices/<service>`). With no
    /// etcd client the single instance always holds a slot. `workers == 0`
    /// lets every instance hold one.
    pub fn start(
        name: &str,
        registrar: Arc<AppRegistrar>,
        client: Option<Client>,
        interval: Duration,
        workers: usize,
    ) -> Self {
        let holder = Arc::new(AtomicBool::new(client.is_none()));
        let shutdown = Shutdown::new();

        let task = tokio::spawn(refresh_loop(
            prefix_for(name),
            registrar,
            client,
            interval,
            workers,
            holder.clone(),
            shutdown.subscribe(),
        ));

        tracing::info!(name = %name, workers = workers, interval = ?interval, "Mutex job util started");
        Self {
            name: name.to_string(),
            holder,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this instance currently holds a job slot.
    pub fn is_holder(&self) -> bool {
        self.holder.load(Ordering::SeqCst)
    }

    /// Run `job` only if this instance holds a slot.
    pub fn run_if_holder<T>(&self, job: impl FnOnce() -> T) -> Option<T> {
        self.is_holder().then(job)
    }

    /// Stop refreshing and give up the slot.
    pub async fn stop(&self) {
        self.shutdown.trigger();
        let task = self.task.lock().expect("job task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.holder.store(false, Ordering::SeqCst);
        tracing::info!(name = %self.name, "Mutex job util stopped");
    }
}

fn prefix_for(name: &str) -> String {
    format!("/{}/", name.trim_matches('/'))
}

/// Whether `own_id` is among the first `workers` ids in sorted order.
pub fn holds_slot(own_id: &str, ids: &[String], workers: usize) -> bool {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let limit = if workers == 0 { sorted.len() } else { workers };
    sorted.iter().take(limit).any(|id| *id == own_id)
}

async fn refresh_loop(
    prefix: String,
    registrar: Arc<AppRegistrar>,
    client: Option<Client>,
    interval: Duration,
    workers: usize,
    holder: Arc<AtomicBool>,
    signal: ShutdownSignal,
) {
    let Some(mut client) = client else {
        return;
    };
    // Our own key is missing until registration, so listing earlier would
    // always lose the slot.
    if !wait_registered(&registrar, &signal).await {
        return;
    }
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = signal.clone().recv() => return,
            _ = ticker.tick() => {}
        }

        let holds = match registrar.instance() {
            Some(instance) => match discovery::list_instances(&mut client, &prefix).await {
                Ok(instances) => {
                    let ids: Vec<String> = instances.into_iter().map(|i| i.id).collect();
                    holds_slot(&instance.id, &ids, workers)
                }
                Err(e) => {
                    tracing::warn!(prefix = %prefix, error = %e, "Failed to list instances");
                    false
                }
            },
            None => false,
        };

        let previous = holder.swap(holds, Ordering::SeqCst);
        if previous != holds {
            tracing::info!(prefix = %prefix, holder = holds, "Job slot ownership changed");
        }
    }
}

/// Wait until the instance is registered. `false` when shutdown came first.
async fn wait_registered(registrar: &AppRegistrar, signal: &ShutdownSignal) -> bool {
    while !registrar.is_registered() {
        tokio::select! {
            _ = signal.clone().recv() => return false,
            _ = tokio::time::sleep(REGISTRATION_POLL) => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{MemoryRegistrar, Registrar, ServiceInstance};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_sorted_id_holds_single_slot() {
        let all = ids(&["c", "a", "b"]);
        assert!(holds_slot("a", &all, 1));
        assert!(!holds_slot("b", &all, 1));
        assert!(!holds_slot("c", &all, 1));
    }

    #[test]
    fn test_multiple_workers() {
        let all = ids(&["c", "a", "b", "a"]);
        assert!(holds_slot("a", &all, 2));
        assert!(holds_slot("b", &all, 2));
        assert!(!holds_slot("c", &all, 2));
    }

    #[test]
    fn test_unlimited_workers_and_unknown_id() {
        let all = ids(&["x", "y"]);
        assert!(holds_slot("y", &all, 0));
        assert!(!holds_slot("z", &all, 0));
        assert!(!holds_slot("z", &[], 1));
    }

    #[test]
    fn test_prefix_normalisation() {
        assert_eq!(prefix_for("microservices/svc"), "/microservices/svc/");
        assert_eq!(prefix_for("/microservices/svc/"), "/microservices/svc/");
    }

    fn memory_registrar() -> Arc<AppRegistrar> {
        let registrar = AppRegistrar::new(Some(Arc::new(MemoryRegistrar::new()) as Arc<dyn Registrar>));
        registrar.attach(ServiceInstance {
            id: "a".into(),
            name: "svc".into(),
            version: "v1".into(),
            metadata: Default::default(),
            endpoints: vec![],
        });
        Arc::new(registrar)
    }

    #[tokio::test]
    async fn test_refresh_waits_for_registration() {
        let registrar = memory_registrar();
        let shutdown = Shutdown::new();

        let waiter = {
            let registrar = registrar.clone();
            let signal = shutdown.subscribe();
            tokio::spawn(async move { wait_registered(&registrar, &signal).await })
        };

        tokio::time::sleep(REGISTRATION_POLL * 2).await;
        assert!(!waiter.is_finished());

        registrar.register().await.unwrap();
        let registered = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("still waiting after registration")
            .unwrap();
        assert!(registered);
    }

    #[tokio::test]
    async fn test_registration_wait_ends_on_shutdown() {
        let registrar = memory_registrar();
        let shutdown = Shutdown::new();
        shutdown.trigger();

        assert!(!wait_registered(&registrar, &shutdown.subscribe()).await);
    }

    #[tokio::test]
    async fn test_without_etcd_always_holds_until_stopped() {
        let util = MutexJobUtil::start(
            "microservices/svc",
            Arc::new(AppRegistrar::disabled()),
            None,
            Duration::from_millis(10),
            1,
        );
        assert!(util.is_holder());
        assert_eq!(util.run_if_holder(|| 42), Some(42));

        util.stop().await;
        assert!(!util.is_holder());
        assert_eq!(util.run_if_holder(|| 42), None);
    }
}
