// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every setting can be given as a command-line flag or through the matching
//! environment variable, so the same binary works both locally and from a
//! Deployment manifest.

use crate::constants::{
    DEFAULT_IMAGE_PULL_POLICY, DEFAULT_IPFS_CLUSTER_IMAGE, DEFAULT_IPFS_IMAGE,
    DEFAULT_RESYNC_INTERVAL_SECS, MAX_CONCURRENT_RECONCILES, METRICS_SERVER_BIND_ADDRESS,
};
use crate::ipfs_resources::WorkloadDefaults;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Command-line and environment configuration for the operator binary.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "ipfs-operator", version, about = "IPFS Cluster Operator for Kubernetes")]
pub struct Config {
    /// Namespace to watch. Watches all namespaces when unset.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Maximum number of reconciliations running at once
    #[arg(long, env = "MAX_CONCURRENT_RECONCILES", default_value_t = MAX_CONCURRENT_RECONCILES)]
    pub concurrency: u16,

    /// Seconds between periodic resyncs of a healthy `Ipfs` object
    #[arg(long = "resync-secs", env = "RESYNC_INTERVAL_SECS", default_value_t = DEFAULT_RESYNC_INTERVAL_SECS)]
    pub resync_secs: u64,

    /// Address the Prometheus metrics endpoint listens on
    #[arg(long = "metrics-addr", env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_addr: SocketAddr,

    /// Default go-ipfs image
    #[arg(long = "ipfs-image", env = "IPFS_IMAGE", default_value = DEFAULT_IPFS_IMAGE)]
    pub ipfs_image: String,

    /// Default ipfs-cluster image
    #[arg(long = "cluster-image", env = "IPFS_CLUSTER_IMAGE", default_value = DEFAULT_IPFS_CLUSTER_IMAGE)]
    pub cluster_image: String,

    /// Default image pull policy
    #[arg(long = "image-pull-policy", env = "IMAGE_PULL_POLICY", default_value = DEFAULT_IMAGE_PULL_POLICY)]
    pub image_pull_policy: String,
}

impl Config {
    /// Periodic resync interval.
    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    /// Workload defaults handed to the resource builders.
    #[must_use]
    pub fn workload_defaults(&self) -> WorkloadDefaults {
        WorkloadDefaults {
            ipfs_image: self.ipfs_image.clone(),
            cluster_image: self.cluster_image.clone(),
            image_pull_policy: self.image_pull_policy.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
