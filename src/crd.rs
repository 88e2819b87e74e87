// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for IPFS cluster deployments.
//!
//! The operator reconciles a single namespaced resource, [`Ipfs`], which declares
//! the desired shape of an IPFS cluster: how many peers to run and how much
//! storage each peer gets.
//!
//! # Example: Declaring a cluster
//!
//! ```rust,no_run
//! use ipfs_operator::crd::{Ipfs, IpfsSpec};
//! use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
//!
//! let spec = IpfsSpec {
//!     replicas: 3,
//!     ipfs_storage: Quantity("100Gi".to_string()),
//!     cluster_storage: Quantity("5Gi".to_string()),
//!     image: None,
//! };
//! let ipfs = Ipfs::new("ipfs-sample", spec);
//! ```

use crate::constants::{DEFAULT_CLUSTER_STORAGE, DEFAULT_IPFS_STORAGE, DEFAULT_REPLICAS};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `Ipfs` declares an IPFS cluster.
///
/// The operator derives a `ServiceAccount`, a `Service`, two `ConfigMaps`, a
/// `Secret` and a `StatefulSet` from this spec, all owned by the `Ipfs` object
/// and garbage-collected with it.
///
/// # Example YAML
///
/// ```yaml
/// apiVersion: cluster.ipfs.io/v1alpha1
/// kind: Ipfs
/// metadata:
///   name: ipfs-sample
///   namespace: demo
/// spec:
///   replicas: 3
///   ipfsStorage: 100Gi
///   clusterStorage: 5Gi
/// ```
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.ipfs.io",
    version = "v1alpha1",
    kind = "Ipfs",
    plural = "ipfs",
    namespaced,
    doc = "Ipfs represents an IPFS cluster. Each Ipfs object is reconciled into a StatefulSet of go-ipfs and ipfs-cluster peers sharing one cluster secret and one bootstrap peer identity."
)]
#[serde(rename_all = "camelCase")]
pub struct IpfsSpec {
    /// Number of cluster peers. Values below 1 are treated as 1.
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Size of the volume claim backing each peer's IPFS datastore.
    #[serde(default = "default_ipfs_storage")]
    pub ipfs_storage: Quantity,

    /// Size of the volume claim backing each peer's ipfs-cluster state.
    #[serde(default = "default_cluster_storage")]
    pub cluster_storage: Quantity,

    /// Container image overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,
}

/// Container image configuration for cluster peers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// go-ipfs image (e.g. "ipfs/go-ipfs:v0.12.2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs: Option<String>,

    /// ipfs-cluster image (e.g. "ipfs/ipfs-cluster:v1.0.0")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// Image pull policy
    ///
    /// Example: "`IfNotPresent`", "Always", "Never"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
}

impl IpfsSpec {
    /// Replica count with the lower bound applied.
    #[must_use]
    pub fn effective_replicas(&self) -> i32 {
        self.replicas.max(DEFAULT_REPLICAS)
    }
}

fn default_replicas() -> i32 {
    DEFAULT_REPLICAS
}

fn default_ipfs_storage() -> Quantity {
    Quantity(DEFAULT_IPFS_STORAGE.to_string())
}

fn default_cluster_storage() -> Quantity {
    Quantity(DEFAULT_CLUSTER_STORAGE.to_string())
}

impl Default for IpfsSpec {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            ipfs_storage: default_ipfs_storage(),
            cluster_storage: default_cluster_storage(),
            image: None,
        }
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
