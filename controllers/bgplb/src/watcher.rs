//! Kubernetes resource watchers.
//!
//! Services are watched with a raw `kube_runtime::watcher` stream so each
//! event can be compared with the previous version of the object (see
//! `admission`). Admitted events are dispatched to their own task, which
//! retries failed reconciliations with a Fibonacci backoff.
//!
//! The pool CRDs use the generic `watch_resource()` helper built on
//! `kube_runtime::Controller`, requeueing every resync interval so the usage
//! reported in their status stays current.

use crate::admission::{admit, ChangeTracker};
use crate::backoff::FibonacciBackoff;
use crate::config::RetryPolicy;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::ServiceKey;
use crds::{BGPConfiguration, BGPIPsConfig};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use kube_runtime::{controller::Action, watcher, Controller, WatchStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Generic watcher helper on top of `kube_runtime::Controller`.
///
/// The controller handles reconnection and requeueing. On success the
/// object is requeued after `resync`; on failure after `retry_delay`.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
    resync: Duration,
    retry_delay: Duration,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ControllerError>> + Send>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, _ctx: Arc<Reconciler>| {
        error!(
            "Reconciliation error for {} {}: {}",
            resource_name,
            obj.meta().name.as_deref().unwrap_or("<unnamed>"),
            error
        );
        Action::requeue(retry_delay)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!(
                "Reconciling {} {}",
                resource_name,
                obj.meta().name.as_deref().unwrap_or("<unnamed>")
            );
            reconcile_fn(ctx, obj).await?;
            Ok::<Action, ControllerError>(Action::requeue(resync))
        }
    };

    Controller::new(api, watcher::Config::default())
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                warn!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Err(ControllerError::Watch(format!("{resource_name} controller stream ended")))
}

/// Reconcile `key`, retrying failures with backoff.
///
/// Makes at most `retry.max_retries + 1` attempts and returns the last error
/// once they are used up.
pub(crate) async fn reconcile_with_retry(
    reconciler: &Reconciler,
    key: &ServiceKey,
    retry: RetryPolicy,
) -> Result<(), ControllerError> {
    let mut backoff = FibonacciBackoff::new(retry.min_seconds, retry.max_seconds);
    let mut retries = 0;
    loop {
        match reconciler.reconcile_service(key).await {
            Ok(()) => return Ok(()),
            Err(e) if retries < retry.max_retries => {
                retries += 1;
                let delay = backoff.next_backoff();
                warn!(
                    "Reconciliation of Service {} failed ({}), retry {}/{} in {:?}",
                    key, e, retries, retry.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    "Giving up on Service {} after {} retries: {}",
                    key, retry.max_retries, e
                );
                return Err(e);
            }
        }
    }
}

/// Watches Services and the pool CRDs.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    service_api: Api<Service>,
    ip_pool_api: Api<BGPIPsConfig>,
    bgp_configuration_api: Api<BGPConfiguration>,
    retry: RetryPolicy,
    pool_resync: Duration,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("retry", &self.retry)
            .field("pool_resync", &self.pool_resync)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        service_api: Api<Service>,
        ip_pool_api: Api<BGPIPsConfig>,
        bgp_configuration_api: Api<BGPConfiguration>,
        retry: RetryPolicy,
        pool_resync: Duration,
    ) -> Self {
        Self {
            reconciler,
            service_api,
            ip_pool_api,
            bgp_configuration_api,
            retry,
            pool_resync,
        }
    }

    /// Watches Services, dispatching admitted changes.
    ///
    /// Runs until the watch stream ends, which only happens on shutdown.
    pub async fn watch_services(&self) -> Result<(), ControllerError> {
        info!("Starting Service watcher");

        let mut tracker = ChangeTracker::new();
        let mut stream = watcher::watcher(self.service_api.clone(), watcher::Config::default())
            .default_backoff()
            .boxed();

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("Service watch error: {}", e);
                    continue;
                }
            };
            let Some(change) = tracker.observe(event) else {
                continue;
            };
            if !admit(&change) {
                continue;
            }
            if let Some(key) = change.key() {
                self.dispatch(key);
            }
        }

        Err(ControllerError::Watch("Service watch stream ended".to_string()))
    }

    /// Reconcile `key` on its own task
    fn dispatch(&self, key: ServiceKey) {
        debug!("Dispatching Service {}", key);
        let reconciler = Arc::clone(&self.reconciler);
        let retry = self.retry;
        tokio::spawn(async move {
            // Failures are logged by reconcile_with_retry
            let _ = reconcile_with_retry(&reconciler, &key, retry).await;
        });
    }

    /// Watches BGPIPsConfig resources.
    pub async fn watch_ip_pools(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.ip_pool_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_ip_pool(&resource).await })
            },
            "BGPIPsConfig",
            self.pool_resync,
            Duration::from_secs(self.retry.max_seconds),
        )
        .await
    }

    /// Watches BGPConfiguration resources.
    pub async fn watch_bgp_configurations(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.bgp_configuration_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_bgp_configuration(&resource).await })
            },
            "BGPConfiguration",
            self.pool_resync,
            Duration::from_secs(self.retry.max_seconds),
        )
        .await
    }
}
