// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction over the Kubernetes API server.
//!
//! The reconcile engine only needs four operations from the cluster: get,
//! create, merge-patch and update, all keyed by namespace, name and kind.
//! [`ObjectStore`] captures exactly that surface so the engine can run
//! against the real API server ([`KubeStore`]) or an in-memory store in tests.
//!
//! Every operation is generic over the object kind; the kind is carried by the
//! Rust type through `kube::Resource`.

use crate::constants::FIELD_MANAGER;
use crate::errors::StoreError;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// A namespaced Kubernetes object the store can read and write.
pub trait StoreObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> StoreObject for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Strongly consistent object store with optimistic concurrency.
///
/// Implementations must make `create` atomic with respect to identity: of two
/// concurrent creates for the same namespace/name/kind, exactly one succeeds
/// and the other fails with [`StoreError::AlreadyExists`]. `update` must
/// reject writes whose `resourceVersion` is stale with [`StoreError::Conflict`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, returning `Ok(None)` when it does not exist.
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str)
        -> Result<Option<K>, StoreError>;

    /// Create an object. Fails with [`StoreError::AlreadyExists`] on identity clash.
    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Apply a JSON merge patch (RFC 7386) to an existing object.
    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;

    /// Replace an object, guarded by its `resourceVersion`.
    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;
}

/// Extract the namespace/name identity of an object.
///
/// # Errors
///
/// Returns [`StoreError::MissingMetadata`] if the object has no name or namespace.
pub fn object_key<K: StoreObject>(object: &K) -> Result<(String, String), StoreError> {
    let meta = object.meta();
    let name = meta
        .name
        .clone()
        .ok_or(StoreError::MissingMetadata("name"))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("namespace"))?;
    Ok((namespace, name))
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap a Kubernetes client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoreObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "GET");
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, name))
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "CREATE");
        self.api::<K>(&namespace)
            .create(&post_params(), object)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), &namespace, &name))
    }

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "PATCH (merge)");
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<K>(namespace)
            .patch(name, &params, &Patch::Merge(patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, name))
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "UPDATE");
        self.api::<K>(&namespace)
            .replace(&name, &post_params(), object)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), &namespace, &name))
    }
}
