// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create-or-patch for child resources.
//!
//! Every child object is driven toward its desired form with the same
//! protocol:
//!
//! 1. Try to create it.
//! 2. On `AlreadyExists`, fetch the live object and compute a JSON merge patch
//!    (RFC 7386) from the desired object.
//! 3. Apply the patch locally; if the result equals the live object nothing is
//!    sent, otherwise the patch is sent to the store.
//!
//! Fields the desired object does not mention are left as they are on the live
//! object, so defaults filled in by the API server or values owned by other
//! controllers survive.
//!
//! # Example
//!
//! ```rust,no_run
//! use ipfs_operator::reconcilers::resources::{create_or_patch, ApplyOutcome};
//! use ipfs_operator::store::KubeStore;
//! use k8s_openapi::api::core::v1::ServiceAccount;
//!
//! async fn example(store: &KubeStore, sa: ServiceAccount) -> anyhow::Result<()> {
//!     match create_or_patch(store, &sa, "service account").await? {
//!         ApplyOutcome::Created => println!("created"),
//!         ApplyOutcome::Patched => println!("patched"),
//!         ApplyOutcome::Unchanged => {}
//!     }
//!     Ok(())
//! }
//! ```

use crate::errors::StoreError;
use crate::store::{object_key, ObjectStore, StoreObject};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// What [`create_or_patch`] did to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed and differed; a merge patch was sent.
    Patched,
    /// The object existed and already matched; nothing was sent.
    Unchanged,
}

impl ApplyOutcome {
    /// Label used in metrics and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Patched => "patched",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Build the merge patch that drives a live object toward `desired`.
///
/// The patch is `desired` serialized, with `metadata` reduced to identity,
/// labels, annotations and owner references. Server-managed metadata such as
/// `resourceVersion` or `uid` is never part of the patch.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if `desired` cannot be serialized.
pub fn build_merge_patch<K: StoreObject>(desired: &K) -> Result<Value, StoreError> {
    let mut patch = serde_json::to_value(desired)?;
    let meta = desired.meta();

    let mut metadata = Map::new();
    if let Some(name) = &meta.name {
        metadata.insert("name".into(), Value::String(name.clone()));
    }
    if let Some(namespace) = &meta.namespace {
        metadata.insert("namespace".into(), Value::String(namespace.clone()));
    }
    if let Some(labels) = &meta.labels {
        metadata.insert("labels".into(), serde_json::to_value(labels)?);
    }
    if let Some(annotations) = &meta.annotations {
        metadata.insert("annotations".into(), serde_json::to_value(annotations)?);
    }
    if let Some(owner_references) = &meta.owner_references {
        metadata.insert(
            "ownerReferences".into(),
            serde_json::to_value(owner_references)?,
        );
    }

    if let Value::Object(fields) = &mut patch {
        fields.insert("metadata".into(), Value::Object(metadata));
        fields.remove("status");
    }
    Ok(patch)
}

/// Whether merging `patch` into `live` would change it.
#[must_use]
pub fn patch_changes(live: &Value, patch: &Value) -> bool {
    let mut merged = live.clone();
    json_patch::merge(&mut merged, patch);
    merged != *live
}

/// Create `desired`, or merge-patch the existing object toward it.
///
/// `what` names the child in log messages (e.g. `"scripts configmap"`).
///
/// # Errors
///
/// Returns the [`StoreError`] of the first failing store call. An object that
/// vanishes between the `AlreadyExists` response and the fetch is reported as
/// [`StoreError::NotFound`].
pub async fn create_or_patch<S, K>(
    store: &S,
    desired: &K,
    what: &str,
) -> Result<ApplyOutcome, StoreError>
where
    S: ObjectStore,
    K: StoreObject,
{
    let (namespace, name) = object_key(desired)?;

    debug!(
        namespace = %namespace,
        name = %name,
        kind = %K::kind(&()),
        "Creating or patching {}",
        what
    );

    match store.create(desired).await {
        Ok(_) => {
            info!("Created {} {}/{}", what, namespace, name);
            return Ok(ApplyOutcome::Created);
        }
        Err(e) if e.is_already_exists() => {
            debug!("{} {}/{} already exists, comparing", what, namespace, name);
        }
        Err(e) => return Err(e),
    }

    let live = store
        .get::<K>(&namespace, &name)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            namespace: namespace.clone(),
            name: name.clone(),
        })?;

    let patch = build_merge_patch(desired)?;
    let live_value = serde_json::to_value(&live)?;

    if !patch_changes(&live_value, &patch) {
        debug!("{} {}/{} is up to date", what, namespace, name);
        return Ok(ApplyOutcome::Unchanged);
    }

    store.patch::<K>(&namespace, &name, &patch).await?;
    info!("Patched {} {}/{}", what, namespace, name);
    Ok(ApplyOutcome::Patched)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
