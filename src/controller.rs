// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller binding for `Ipfs` resources.
//!
//! Registers [`reconcile_ipfs`] with a `kube::runtime::Controller` that watches
//! `Ipfs` objects in full and the metadata of every child kind they own, and
//! maps each pass outcome to the controller's requeue schedule:
//!
//! - `Requeue` re-runs the pass after one second
//! - `Done` re-runs it after the resync interval
//! - an error re-runs it after the error backoff

use crate::config::Config;
use crate::constants::{ERROR_REQUEUE_DURATION_SECS, IMMEDIATE_REQUEUE_SECS};
use crate::context::Context;
use crate::crd::Ipfs;
use crate::reconcilers::{reconcile_ipfs, ReconcileOutcome};
use crate::store::KubeStore;
use anyhow::{anyhow, Result};
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use kube::core::{NamespaceResourceScope, PartialObjectMeta};
use kube::runtime::controller::{self, Action};
use kube::runtime::{metadata_watcher, watcher, Controller, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ControllerError(#[from] anyhow::Error);

/// State shared by every reconciliation the controller runs.
pub struct ControllerContext {
    /// Engine context
    pub engine: Context<KubeStore>,
    /// Requeue delay after a clean pass
    pub resync_interval: Duration,
}

/// Map a pass outcome to the controller's next action.
#[must_use]
pub fn action_for(outcome: ReconcileOutcome, resync_interval: Duration) -> Action {
    match outcome {
        ReconcileOutcome::Requeue => Action::requeue(Duration::from_secs(IMMEDIATE_REQUEUE_SECS)),
        ReconcileOutcome::Done => Action::requeue(resync_interval),
    }
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Metadata-only change stream for an owned child kind.
///
/// Owner references live in metadata, so this is all the controller needs to
/// map a child event back to its `Ipfs` object.
pub fn owned_metadata<K>(
    api: Api<K>,
    watcher_config: watcher::Config,
) -> impl Stream<Item = Result<PartialObjectMeta<K>, watcher::Error>> + Send + 'static
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + 'static,
{
    metadata_watcher(api, watcher_config).touched_objects()
}

/// Run the `Ipfs` controller until a shutdown signal arrives.
pub async fn run_ipfs_controller(client: Client, config: &Config) -> Result<()> {
    let namespace = config.namespace.as_deref();
    info!(
        namespace = namespace.unwrap_or("<all>"),
        concurrency = config.concurrency,
        "Starting Ipfs controller"
    );

    let ctx = Arc::new(ControllerContext {
        engine: Context::for_client(client.clone(), config.workload_defaults()),
        resync_interval: config.resync_interval(),
    });

    let watcher_config = watcher::Config::default();

    Controller::new(scoped_api::<Ipfs>(&client, namespace), watcher_config.clone())
        .owns_stream(owned_metadata(
            scoped_api::<StatefulSet>(&client, namespace),
            watcher_config.clone(),
        ))
        .owns_stream(owned_metadata(
            scoped_api::<Service>(&client, namespace),
            watcher_config.clone(),
        ))
        .owns_stream(owned_metadata(
            scoped_api::<ServiceAccount>(&client, namespace),
            watcher_config.clone(),
        ))
        .owns_stream(owned_metadata(
            scoped_api::<Secret>(&client, namespace),
            watcher_config.clone(),
        ))
        .owns_stream(owned_metadata(
            scoped_api::<ConfigMap>(&client, namespace),
            watcher_config,
        ))
        .with_config(controller::Config::default().concurrency(config.concurrency))
        .shutdown_on_signal()
        .run(reconcile_ipfs_wrapper, error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((object, _)) => debug!("Reconciled {}", object),
                Err(e) => warn!("Controller stream error: {}", e),
            }
            futures::future::ready(())
        })
        .await;

    info!("Ipfs controller stopped");
    Ok(())
}

/// Reconcile wrapper for `Ipfs`
async fn reconcile_ipfs_wrapper(
    ipfs: Arc<Ipfs>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ControllerError> {
    let name = ipfs.name_any();
    let namespace = ipfs
        .namespace()
        .ok_or_else(|| anyhow!("Ipfs {name} has no namespace"))?;

    match reconcile_ipfs(&ctx.engine, &namespace, &name).await {
        Ok(outcome) => {
            debug!(
                namespace = %namespace,
                name = %name,
                outcome = ?outcome,
                "Reconcile pass finished"
            );
            Ok(action_for(outcome, ctx.resync_interval))
        }
        Err(e) => {
            error!("Failed to reconcile Ipfs {}/{}: {}", namespace, name, e);
            Err(anyhow::Error::from(e).into())
        }
    }
}

/// Error policy for the `Ipfs` controller.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy(ipfs: Arc<Ipfs>, err: &ControllerError, _ctx: Arc<ControllerContext>) -> Action {
    error!(
        error = %err,
        namespace = ?ipfs.namespace(),
        name = %ipfs.name_any(),
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
