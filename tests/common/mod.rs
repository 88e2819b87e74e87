// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests
//!
//! [`MemoryStore`] is an in-memory [`ObjectStore`] with the API server
//! behaviour the reconcile engine relies on: atomic create, optimistic
//! concurrency on update, merge patches, finalizer-gated deletion and
//! owner-reference garbage collection.

#![allow(dead_code)]

use async_trait::async_trait;
use ipfs_operator::crd::{Ipfs, IpfsSpec};
use ipfs_operator::errors::{IdentityError, StoreError};
use ipfs_operator::identity::{IdentityMaterial, IdentitySource, SeededIdentitySource};
use ipfs_operator::store::{object_key, ObjectStore, StoreObject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub const NAMESPACE: &str = "demo";
pub const NAME: &str = "ipfs-sample";

/// Store operation, used for failure injection and the mutation log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Get,
    Create,
    Patch,
    Update,
    Delete,
}

type Key = (String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Key, Value>,
    next_version: u64,
    next_uid: u64,
    failures: Vec<(Op, String, StoreError)>,
    log: Vec<(Op, String, String)>,
}

impl Inner {
    fn injected(&self, op: Op, kind: &str) -> Option<StoreError> {
        self.failures
            .iter()
            .find(|(o, k, _)| *o == op && k == kind)
            .map(|(_, _, e)| e.clone())
    }

    fn bump_version(&mut self, object: &mut Value) {
        self.next_version += 1;
        object["metadata"]["resourceVersion"] = json!(self.next_version.to_string());
    }

    /// Drop `key` and everything owned by it, transitively.
    fn collect(&mut self, key: &Key) {
        let Some(removed) = self.objects.remove(key) else {
            return;
        };
        let Some(uid) = removed["metadata"]["uid"].as_str().map(str::to_string) else {
            return;
        };
        let owned: Vec<Key> = self
            .objects
            .iter()
            .filter(|(_, v)| {
                v["metadata"]["ownerReferences"]
                    .as_array()
                    .is_some_and(|refs| refs.iter().any(|r| r["uid"] == json!(uid)))
            })
            .map(|(k, _)| k.clone())
            .collect();
        for child in owned {
            self.collect(&child);
        }
    }

    /// Finish deletion of a terminating object once its finalizers are gone.
    fn settle(&mut self, key: &Key) {
        let done = self.objects.get(key).is_some_and(|v| {
            !v["metadata"]["deletionTimestamp"].is_null()
                && v["metadata"]["finalizers"]
                    .as_array()
                    .is_none_or(Vec::is_empty)
        });
        if done {
            self.collect(key);
        }
    }
}

/// In-memory object store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn kind_of<K: StoreObject>() -> String {
    K::kind(&()).to_string()
}

fn key(kind: &str, namespace: &str, name: &str) -> Key {
    (kind.to_string(), namespace.to_string(), name.to_string())
}

fn not_found(kind: &str, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Make every `op` on `kind` fail with `error` until cleared
    pub fn fail(&self, op: Op, kind: &str, error: StoreError) {
        self.lock().failures.push((op, kind.to_string(), error));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Number of successful writes so far
    pub fn mutations(&self) -> usize {
        self.lock().log.len()
    }

    /// Successful writes so far as (op, kind, name)
    pub fn mutation_log(&self) -> Vec<(Op, String, String)> {
        self.lock().log.clone()
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn contains(&self, kind: &str, namespace: &str, name: &str) -> bool {
        self.lock().objects.contains_key(&key(kind, namespace, name))
    }

    /// Raw stored form of an object
    pub fn raw(&self, kind: &str, namespace: &str, name: &str) -> Option<Value> {
        self.lock().objects.get(&key(kind, namespace, name)).cloned()
    }

    /// Typed read that bypasses failure injection
    pub fn read<K: StoreObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.raw(&kind_of::<K>(), namespace, name)
            .map(|v| serde_json::from_value(v).unwrap())
    }

    /// Remove an object out from under the operator, without garbage collection
    pub fn remove_raw(&self, kind: &str, namespace: &str, name: &str) {
        self.lock().objects.remove(&key(kind, namespace, name));
    }

    /// Overwrite part of a stored object out from under the operator
    pub fn tamper(&self, kind: &str, namespace: &str, name: &str, patch: &Value) {
        let mut inner = self.lock();
        let k = key(kind, namespace, name);
        let mut object = inner.objects.remove(&k).unwrap();
        json_patch::merge(&mut object, patch);
        inner.bump_version(&mut object);
        inner.objects.insert(k, object);
    }

    /// Request deletion the way the API server does it
    ///
    /// Objects with finalizers are only marked; others are removed along with
    /// everything they own.
    pub fn delete(&self, kind: &str, namespace: &str, name: &str) {
        let mut inner = self.lock();
        let k = key(kind, namespace, name);
        let Some(mut object) = inner.objects.remove(&k) else {
            return;
        };
        inner.log.push((Op::Delete, kind.to_string(), name.to_string()));
        object["metadata"]["deletionTimestamp"] = json!("2025-01-01T00:00:00Z");
        inner.bump_version(&mut object);
        inner.objects.insert(k.clone(), object);
        inner.settle(&k);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        let kind = kind_of::<K>();
        let inner = self.lock();
        if let Some(e) = inner.injected(Op::Get, &kind) {
            return Err(e);
        }
        inner
            .objects
            .get(&key(&kind, namespace, name))
            .map(|v| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .transpose()
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        let (namespace, name) = object_key(object)?;
        let mut inner = self.lock();
        if let Some(e) = inner.injected(Op::Create, &kind) {
            return Err(e);
        }
        let k = key(&kind, &namespace, &name);
        if inner.objects.contains_key(&k) {
            return Err(StoreError::AlreadyExists {
                kind,
                namespace,
                name,
            });
        }

        let mut value = serde_json::to_value(object)?;
        inner.next_uid += 1;
        value["metadata"]["uid"] = json!(format!("uid-{}", inner.next_uid));
        inner.bump_version(&mut value);
        let created = serde_json::from_value(value.clone())?;
        inner.objects.insert(k, value);
        inner.log.push((Op::Create, kind, name));
        Ok(created)
    }

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        let mut inner = self.lock();
        if let Some(e) = inner.injected(Op::Patch, &kind) {
            return Err(e);
        }
        let k = key(&kind, namespace, name);
        let Some(mut value) = inner.objects.get(&k).cloned() else {
            return Err(not_found(&kind, namespace, name));
        };

        let uid = value["metadata"]["uid"].clone();
        json_patch::merge(&mut value, patch);
        value["metadata"]["uid"] = uid;
        inner.bump_version(&mut value);
        let patched = serde_json::from_value(value.clone())?;
        inner.objects.insert(k.clone(), value);
        inner.log.push((Op::Patch, kind, name.to_string()));
        inner.settle(&k);
        Ok(patched)
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let kind = kind_of::<K>();
        let (namespace, name) = object_key(object)?;
        let mut inner = self.lock();
        if let Some(e) = inner.injected(Op::Update, &kind) {
            return Err(e);
        }
        let k = key(&kind, &namespace, &name);
        let Some(live) = inner.objects.get(&k).cloned() else {
            return Err(not_found(&kind, &namespace, &name));
        };

        let sent_version = object.meta().resource_version.clone();
        let live_version = live["metadata"]["resourceVersion"].as_str().map(str::to_string);
        if sent_version.is_some() && sent_version != live_version {
            return Err(StoreError::Conflict {
                kind,
                namespace,
                name,
                message: "the object has been modified".to_string(),
            });
        }

        let mut value = serde_json::to_value(object)?;
        value["metadata"]["uid"] = live["metadata"]["uid"].clone();
        value["metadata"]["deletionTimestamp"] = live["metadata"]["deletionTimestamp"].clone();
        if value["metadata"]["deletionTimestamp"].is_null() {
            if let Some(meta) = value["metadata"].as_object_mut() {
                meta.remove("deletionTimestamp");
            }
        }
        inner.bump_version(&mut value);
        let updated = serde_json::from_value(value.clone())?;
        inner.objects.insert(k.clone(), value);
        inner.log.push((Op::Update, kind, name));
        inner.settle(&k);
        Ok(updated)
    }
}

/// [`ObjectStore`] that yields to the scheduler before every call
///
/// Passes joined on one task interleave at each store call instead of
/// running back to back.
#[derive(Clone, Default)]
pub struct YieldingStore {
    inner: MemoryStore,
}

impl YieldingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStore for YieldingStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(namespace, name).await
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        tokio::task::yield_now().await;
        self.inner.create(object).await
    }

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, StoreError> {
        tokio::task::yield_now().await;
        self.inner.patch(namespace, name, patch).await
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        tokio::task::yield_now().await;
        self.inner.update(object).await
    }
}

/// [`IdentitySource`] whose entropy source is always exhausted
pub struct FailingIdentitySource;

impl IdentitySource for FailingIdentitySource {
    fn generate(&self) -> Result<IdentityMaterial, IdentityError> {
        Err(IdentityError::Entropy("entropy unavailable".to_string()))
    }
}

/// [`IdentitySource`] that counts how often it was asked for fresh material
pub struct CountingIdentitySource {
    inner: SeededIdentitySource,
    calls: AtomicUsize,
}

impl CountingIdentitySource {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: SeededIdentitySource::new(seed),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentitySource for CountingIdentitySource {
    fn generate(&self) -> Result<IdentityMaterial, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate()
    }
}

/// Build an `Ipfs` object in `namespace`
pub fn ipfs(namespace: &str, name: &str, replicas: i32) -> Ipfs {
    let mut ipfs = Ipfs::new(
        name,
        IpfsSpec {
            replicas,
            ipfs_storage: Quantity("10Gi".to_string()),
            cluster_storage: Quantity("5Gi".to_string()),
            image: None,
        },
    );
    ipfs.metadata.namespace = Some(namespace.to_string());
    ipfs
}

/// Store the sample `Ipfs` object and return it as stored
pub async fn seed_sample(store: &MemoryStore) -> Ipfs {
    store.create(&ipfs(NAMESPACE, NAME, 3)).await.unwrap()
}

pub fn transport_error() -> StoreError {
    StoreError::Transport("connection refused".to_string())
}
