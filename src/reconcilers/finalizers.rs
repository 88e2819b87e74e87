// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `Ipfs` resources.
//!
//! A finalizer token on an object records that the operator still owes it
//! cleanup. The token moves through four observable states:
//!
//! ```text
//!   Unmanaged --add--> Managed --delete requested--> Terminating --remove--> Released
//! ```
//!
//! [`FinalizerState::observe`] classifies an object; [`add_finalizer`] and
//! [`remove_finalizer`] perform the two transitions the operator drives. Both
//! write through [`ObjectStore::update`], so a stale copy of the object is
//! rejected by the store instead of silently clobbering concurrent edits.
//!
//! # Example
//!
//! ```rust,ignore
//! use ipfs_operator::constants::IPFS_FINALIZER;
//! use ipfs_operator::reconcilers::finalizers::{add_finalizer, FinalizerState};
//!
//! match FinalizerState::observe(&ipfs.metadata, IPFS_FINALIZER) {
//!     FinalizerState::Unmanaged => {
//!         add_finalizer(&store, &ipfs, IPFS_FINALIZER).await?;
//!     }
//!     _ => {}
//! }
//! ```

use crate::errors::StoreError;
use crate::store::{ObjectStore, StoreObject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::info;

/// Lifecycle state of an object with respect to one finalizer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerState {
    /// Not being deleted, token absent.
    Unmanaged,
    /// Not being deleted, token present.
    Managed,
    /// Deletion requested, token still present.
    Terminating,
    /// Deletion requested, token already gone.
    Released,
}

impl FinalizerState {
    /// Classify `meta` with respect to `token`.
    #[must_use]
    pub fn observe(meta: &ObjectMeta, token: &str) -> Self {
        let deleting = meta.deletion_timestamp.is_some();
        match (deleting, has_finalizer(meta, token)) {
            (false, false) => Self::Unmanaged,
            (false, true) => Self::Managed,
            (true, true) => Self::Terminating,
            (true, false) => Self::Released,
        }
    }
}

/// Whether `token` is among the finalizers in `meta`.
#[must_use]
pub fn has_finalizer(meta: &ObjectMeta, token: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|t| t == token))
}

/// Add a finalizer to a resource if not already present.
///
/// The operation is idempotent: if the token is already present the resource
/// is returned unchanged and no write is made.
///
/// # Errors
///
/// Returns the [`StoreError`] from the update, including
/// [`StoreError::Conflict`] when `resource` is stale.
pub async fn add_finalizer<S, K>(store: &S, resource: &K, token: &str) -> Result<K, StoreError>
where
    S: ObjectStore,
    K: StoreObject,
{
    if has_finalizer(resource.meta(), token) {
        return Ok(resource.clone());
    }

    info!(
        "Adding finalizer {} to {}/{} {}",
        token,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        K::kind(&())
    );

    let mut updated = resource.clone();
    updated
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(token.to_string());
    store.update(&updated).await
}

/// Remove a finalizer from a resource.
///
/// Only `token` is removed; finalizers owned by other controllers are kept.
///
/// # Errors
///
/// Returns the [`StoreError`] from the update, including
/// [`StoreError::Conflict`] when `resource` is stale.
pub async fn remove_finalizer<S, K>(store: &S, resource: &K, token: &str) -> Result<K, StoreError>
where
    S: ObjectStore,
    K: StoreObject,
{
    if !has_finalizer(resource.meta(), token) {
        return Ok(resource.clone());
    }

    info!(
        "Removing finalizer {} from {}/{} {}",
        token,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        K::kind(&())
    );

    let mut updated = resource.clone();
    if let Some(finalizers) = updated.meta_mut().finalizers.as_mut() {
        finalizers.retain(|t| t != token);
    }
    store.update(&updated).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
