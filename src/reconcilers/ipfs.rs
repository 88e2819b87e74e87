// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Ipfs` reconciliation logic.
//!
//! One pass of [`reconcile_ipfs`] does the following:
//!
//! 1. Fetch the `Ipfs` object. A missing object ends the pass quietly.
//! 2. Drive the finalizer state machine. Adding or removing the finalizer ends
//!    the pass; only objects already carrying the finalizer go further.
//! 3. Resolve identity material: reuse what the cluster `Secret` holds, or
//!    generate a fresh identity if there is nothing usable there.
//! 4. Build the six child objects and create-or-patch each of them. Every
//!    child is attempted even when an earlier one failed, except the config
//!    `ConfigMap`, which waits until the `Secret` holds the identity it
//!    publishes. A freshly generated identity is only ever written by
//!    creating the `Secret`, never by patching one that already exists.
//!
//! Failures after step 1 are logged and turned into a requeue request rather
//! than an error, so the controller retries them promptly.

use crate::constants::{IPFS_FINALIZER, KEY_BOOTSTRAP_PEER_PRIV_KEY, KEY_CLUSTER_SECRET};
use crate::context::Context;
use crate::crd::Ipfs;
use crate::errors::{IdentityError, ReconcileError, StoreError};
use crate::identity::IdentityMaterial;
use crate::ipfs_resources::{build_child_resources, ChildNames};
use crate::metrics;
use crate::reconcilers::finalizers::{add_finalizer, remove_finalizer, FinalizerState};
use crate::reconcilers::resources::{create_or_patch, ApplyOutcome};
use crate::store::{ObjectStore, StoreObject};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the controller should do after a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the next change or resync.
    Done,
    /// Run another pass promptly.
    Requeue,
}

impl ReconcileOutcome {
    /// Whether a prompt re-run was requested.
    #[must_use]
    pub fn is_requeue(self) -> bool {
        matches!(self, Self::Requeue)
    }
}

/// Outcome plus the reason a requeue was requested.
enum Pass {
    Done,
    Requeue(&'static str),
}

/// Reconciles the `Ipfs` object `namespace/name`.
///
/// # Errors
///
/// Returns [`ReconcileError::Fetch`] if the `Ipfs` object cannot be read.
/// Every other failure is reported as [`ReconcileOutcome::Requeue`].
pub async fn reconcile_ipfs<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let start = Instant::now();
    info!("Reconciling Ipfs: {}/{}", namespace, name);

    match run_pass(ctx, namespace, name).await {
        Ok(Pass::Done) => {
            metrics::record_reconciliation_success(start.elapsed());
            Ok(ReconcileOutcome::Done)
        }
        Ok(Pass::Requeue(reason)) => {
            metrics::record_reconciliation_requeue(reason, start.elapsed());
            Ok(ReconcileOutcome::Requeue)
        }
        Err(e) => {
            metrics::record_reconciliation_error(start.elapsed());
            Err(e)
        }
    }
}

async fn run_pass<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
) -> Result<Pass, ReconcileError> {
    let ipfs = match ctx.store.get::<Ipfs>(namespace, name).await {
        Ok(Some(ipfs)) => ipfs,
        Ok(None) => {
            debug!("Ipfs {}/{} not found, nothing to do", namespace, name);
            return Ok(Pass::Done);
        }
        Err(source) => {
            metrics::record_error("get", source.kind_label());
            return Err(ReconcileError::Fetch {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            });
        }
    };

    match FinalizerState::observe(&ipfs.metadata, IPFS_FINALIZER) {
        FinalizerState::Unmanaged => {
            if let Err(e) = add_finalizer(&ctx.store, &ipfs, IPFS_FINALIZER).await {
                warn!(
                    "Failed to add finalizer to Ipfs {}/{}: {}",
                    namespace, name, e
                );
                metrics::record_error("finalizer", e.kind_label());
            }
            // Re-run so the persisted finalizer is observed before any child is created
            return Ok(Pass::Requeue("finalizer"));
        }
        FinalizerState::Terminating => {
            return match remove_finalizer(&ctx.store, &ipfs, IPFS_FINALIZER).await {
                Ok(_) => {
                    info!("Released Ipfs {}/{}", namespace, name);
                    Ok(Pass::Done)
                }
                Err(e) => {
                    warn!(
                        "Failed to remove finalizer from Ipfs {}/{}: {}",
                        namespace, name, e
                    );
                    metrics::record_error("finalizer", e.kind_label());
                    Ok(Pass::Requeue("finalizer"))
                }
            };
        }
        FinalizerState::Released => {
            debug!("Ipfs {}/{} is being deleted, finalizer already released", namespace, name);
            return Ok(Pass::Done);
        }
        FinalizerState::Managed => {}
    }

    let names = ChildNames::for_ipfs(name);
    let identity = match resolve_identity(ctx, namespace, &names.secret).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(
                "Failed to resolve identity for Ipfs {}/{}: {}",
                namespace, name, e
            );
            let error_type = match &e {
                ReconcileError::IdentityLookup { source, .. } => source.kind_label(),
                _ => "identity",
            };
            metrics::record_error("identity", error_type);
            return Ok(Pass::Requeue("identity"));
        }
    };

    let children = build_child_resources(&ipfs, identity.material(), &ctx.defaults);

    // The Secret goes before the config ConfigMap, and the peer id is only
    // published once the Secret holds the matching key
    let secret = apply_identity_secret(&ctx.store, &identity, &children.secret).await;
    let config = if secret.is_ok() {
        apply_child(&ctx.store, &children.config_config_map, "config configmap").await
    } else {
        debug!(
            "Skipping config configmap for Ipfs {}/{} until its Secret is stored",
            namespace, name
        );
        Ok(())
    };

    // All others are attempted; any failure requeues the whole pass
    let results = [
        apply_child(&ctx.store, &children.service_account, "service account").await,
        apply_child(&ctx.store, &children.service, "service").await,
        apply_child(&ctx.store, &children.scripts_config_map, "scripts configmap").await,
        secret,
        config,
        apply_child(&ctx.store, &children.stateful_set, "statefulset").await,
    ];

    if results.iter().any(Result::is_err) {
        return Ok(Pass::Requeue("child"));
    }
    Ok(Pass::Done)
}

/// Create-or-patch one child, logging and counting the outcome.
async fn apply_child<S, K>(store: &S, desired: &K, what: &str) -> Result<(), StoreError>
where
    S: ObjectStore,
    K: StoreObject,
{
    let result = create_or_patch(store, desired, what).await;
    record_apply(&K::kind(&()), what, result)
}

fn record_apply(
    kind: &str,
    what: &str,
    result: Result<ApplyOutcome, StoreError>,
) -> Result<(), StoreError> {
    match result {
        Ok(outcome) => {
            metrics::record_child_apply(kind, outcome.as_str());
            Ok(())
        }
        Err(e) => {
            warn!("Failed to reconcile {}: {}", what, e);
            metrics::record_child_apply(kind, "failed");
            metrics::record_error("apply", e.kind_label());
            Err(e)
        }
    }
}

/// Identity material for one pass, and how its `Secret` may be written.
#[derive(Debug)]
enum ResolvedIdentity {
    /// Read back from the `Secret`.
    Persisted(IdentityMaterial),
    /// Generated because no `Secret` exists. The `Secret` may only be created.
    Fresh(IdentityMaterial),
    /// Generated to replace the unusable contents of the given live `Secret`.
    Replacing(IdentityMaterial, Box<Secret>),
}

impl ResolvedIdentity {
    fn material(&self) -> &IdentityMaterial {
        match self {
            Self::Persisted(identity)
            | Self::Fresh(identity)
            | Self::Replacing(identity, _) => identity,
        }
    }
}

/// Write the identity `Secret` without ever overwriting another pass's identity.
///
/// - persisted identity: ordinary create-or-patch
/// - fresh identity: create only; `AlreadyExists` means another pass stored
///   its identity first, and is returned as an error so the pass requeues
/// - replacement: update guarded by the resourceVersion the unusable contents
///   were read at, so a concurrent write surfaces as [`StoreError::Conflict`]
async fn apply_identity_secret<S: ObjectStore>(
    store: &S,
    identity: &ResolvedIdentity,
    desired: &Secret,
) -> Result<(), StoreError> {
    const WHAT: &str = "config secret";

    let result = match identity {
        ResolvedIdentity::Persisted(_) => create_or_patch(store, desired, WHAT).await,
        ResolvedIdentity::Fresh(_) => {
            let created = store.create(desired).await.map(|_| ApplyOutcome::Created);
            if let Err(e) = &created {
                if e.is_already_exists() {
                    info!(
                        "Secret {} was stored by a concurrent pass, discarding generated identity",
                        desired.name_any()
                    );
                }
            }
            created
        }
        ResolvedIdentity::Replacing(_, live) => {
            let mut replacement = (**live).clone();
            replacement.data.clone_from(&desired.data);
            replacement.string_data = None;
            replacement.type_.clone_from(&desired.type_);
            replacement.metadata.labels.clone_from(&desired.metadata.labels);
            replacement
                .metadata
                .owner_references
                .clone_from(&desired.metadata.owner_references);
            store
                .update(&replacement)
                .await
                .map(|_| ApplyOutcome::Patched)
        }
    };
    record_apply("Secret", WHAT, result)
}

/// Identity material for a cluster: persisted if usable, otherwise fresh.
///
/// A read failure on the `Secret` is an error; generating a new identity in
/// that case could replace a cluster's existing one.
async fn resolve_identity<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    secret_name: &str,
) -> Result<ResolvedIdentity, ReconcileError> {
    let secret = ctx
        .store
        .get::<Secret>(namespace, secret_name)
        .await
        .map_err(|source| ReconcileError::IdentityLookup {
            namespace: namespace.to_string(),
            name: secret_name.to_string(),
            source,
        })?;

    let Some(secret) = secret else {
        let identity = generate(ctx, namespace, secret_name)?;
        return Ok(ResolvedIdentity::Fresh(identity));
    };

    match persisted_identity(&secret) {
        Some(Ok(identity)) => {
            debug!(
                "Reusing identity {} from Secret {}/{}",
                identity.peer_id, namespace, secret_name
            );
            metrics::record_identity("persisted");
            return Ok(ResolvedIdentity::Persisted(identity));
        }
        Some(Err(e)) => {
            warn!(
                "Secret {}/{} holds unusable identity material, generating a new one: {}",
                namespace, secret_name, e
            );
        }
        None => {
            warn!(
                "Secret {}/{} holds no identity material, generating a new one",
                namespace, secret_name
            );
        }
    }

    let identity = generate(ctx, namespace, secret_name)?;
    Ok(ResolvedIdentity::Replacing(identity, Box::new(secret)))
}

fn generate<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    secret_name: &str,
) -> Result<IdentityMaterial, ReconcileError> {
    let identity = ctx.identity.generate()?;
    info!(
        "Generated identity {} for Secret {}/{}",
        identity.peer_id, namespace, secret_name
    );
    metrics::record_identity("generated");
    Ok(identity)
}

/// Decode identity material from the cluster `Secret`.
///
/// Returns `None` when either key is missing.
fn persisted_identity(secret: &Secret) -> Option<Result<IdentityMaterial, IdentityError>> {
    let data = secret.data.as_ref()?;
    let private_key = data.get(KEY_BOOTSTRAP_PEER_PRIV_KEY)?;
    let cluster_secret = data.get(KEY_CLUSTER_SECRET)?;

    let decoded = match (
        std::str::from_utf8(&private_key.0),
        std::str::from_utf8(&cluster_secret.0),
    ) {
        (Ok(private_key), Ok(cluster_secret)) => {
            IdentityMaterial::from_encoded(private_key, cluster_secret)
        }
        _ => Err(IdentityError::InvalidKey(
            "Secret values are not UTF-8".to_string(),
        )),
    };
    Some(decoded)
}

#[cfg(test)]
#[path = "ipfs_tests.rs"]
mod ipfs_tests;
