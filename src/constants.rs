// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the IPFS operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Fully qualified API version (group/version); must match the `#[kube]` attributes in `crd.rs`
pub const API_GROUP_VERSION: &str = "cluster.ipfs.io/v1alpha1";

/// Kind name for `Ipfs` resource
pub const KIND_IPFS: &str = "Ipfs";

/// Finalizer token marking outstanding cleanup responsibility on an `Ipfs` object.
///
/// The value is kept stable so objects created by earlier operator releases
/// are still recognised.
pub const IPFS_FINALIZER: &str = "openshift.ifps.cluster";

/// Field manager reported on writes made by the operator
pub const FIELD_MANAGER: &str = "ipfs-operator";

// ============================================================================
// Child Resource Naming
// ============================================================================

/// Name prefix shared by the `ServiceAccount`, `Service` and `StatefulSet`
pub const CLUSTER_NAME_PREFIX: &str = "ipfs-cluster";

/// Name prefix for the scripts `ConfigMap`
pub const SCRIPTS_CONFIGMAP_PREFIX: &str = "ipfs-cluster-scripts";

/// Name prefix for the peer configuration `ConfigMap`
pub const CONFIG_CONFIGMAP_PREFIX: &str = "ipfs-cluster-config";

/// Name prefix for the cluster `Secret`
pub const CONFIG_SECRET_PREFIX: &str = "ipfs-cluster-secret";

// ============================================================================
// Configuration Keys
// ============================================================================

/// `ConfigMap` key holding the bootstrap peer id
pub const KEY_BOOTSTRAP_PEER_ID: &str = "BOOTSTRAP_PEER_ID";

/// `Secret` key holding the base64 bootstrap peer private key
pub const KEY_BOOTSTRAP_PEER_PRIV_KEY: &str = "BOOTSTRAP_PEER_PRIV_KEY";

/// `Secret` key holding the hex cluster secret
pub const KEY_CLUSTER_SECRET: &str = "CLUSTER_SECRET";

/// Scripts `ConfigMap` key for the ipfs-cluster entrypoint
pub const KEY_ENTRYPOINT_SCRIPT: &str = "entrypoint.sh";

/// Scripts `ConfigMap` key for the ipfs init script
pub const KEY_CONFIGURE_IPFS_SCRIPT: &str = "configure-ipfs.sh";

// ============================================================================
// IPFS Network Ports
// ============================================================================

/// libp2p swarm port (TCP)
pub const IPFS_SWARM_PORT: u16 = 4001;

/// libp2p swarm port (UDP/QUIC)
pub const IPFS_SWARM_UDP_PORT: u16 = 4002;

/// IPFS HTTP API port
pub const IPFS_API_PORT: u16 = 5001;

/// IPFS HTTP gateway port
pub const IPFS_GATEWAY_PORT: u16 = 8080;

/// IPFS websocket swarm port
pub const IPFS_WS_PORT: u16 = 8081;

/// ipfs-cluster REST API port
pub const CLUSTER_API_PORT: u16 = 9094;

/// ipfs-cluster IPFS proxy port
pub const CLUSTER_PROXY_PORT: u16 = 9095;

/// ipfs-cluster swarm port
pub const CLUSTER_SWARM_PORT: u16 = 9096;

// ============================================================================
// Workload Defaults
// ============================================================================

/// Default go-ipfs image
pub const DEFAULT_IPFS_IMAGE: &str = "ipfs/go-ipfs:v0.12.2";

/// Default ipfs-cluster image
pub const DEFAULT_IPFS_CLUSTER_IMAGE: &str = "ipfs/ipfs-cluster:v1.0.0";

/// Default image pull policy
pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

/// Default replica count when the spec asks for fewer than one
pub const DEFAULT_REPLICAS: i32 = 1;

/// Default size of the IPFS datastore volume claim
pub const DEFAULT_IPFS_STORAGE: &str = "10Gi";

/// Default size of the ipfs-cluster state volume claim
pub const DEFAULT_CLUSTER_STORAGE: &str = "5Gi";

/// Mount point for the scripts `ConfigMap`
pub const SCRIPTS_MOUNT_PATH: &str = "/custom";

/// IPFS repository path inside the pod
pub const IPFS_DATA_PATH: &str = "/data/ipfs";

/// ipfs-cluster state path inside the pod
pub const CLUSTER_DATA_PATH: &str = "/data/ipfs-cluster";

/// File mode for mounted scripts (0755)
pub const SCRIPTS_DEFAULT_MODE: i32 = 0o755;

/// Interval ipfs-cluster uses to ping peers
pub const CLUSTER_MONITOR_PING_INTERVAL: &str = "3m";

// ============================================================================
// Identity Constants
// ============================================================================

/// Size of the generated cluster shared secret in bytes
pub const CLUSTER_SECRET_BYTES: usize = 32;

/// Size of the OS entropy seed used for the process-wide random source
pub const PROCESS_SEED_BYTES: usize = 8;

// ============================================================================
// Controller Constants
// ============================================================================

/// Maximum number of concurrently running reconciliations
pub const MAX_CONCURRENT_RECONCILES: u16 = 5;

/// Requeue delay when a pass asks to be re-run (1 second)
///
/// Not zero: a child that keeps failing would otherwise be retried in a tight
/// loop. After the finalizer is added, the write itself emits a watch event
/// for the `Ipfs` object, which re-runs the pass without waiting for this delay.
pub const IMMEDIATE_REQUEUE_SECS: u64 = 1;

/// Periodic resync interval after a clean pass (5 minutes)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0:8080";
