// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # ipfs-operator - IPFS Cluster Operator for Kubernetes
//!
//! A Kubernetes operator that runs IPFS clusters declared through the `Ipfs`
//! Custom Resource Definition.
//!
//! ## Overview
//!
//! For every `Ipfs` object the operator keeps six child objects in sync: a
//! `ServiceAccount`, a headless `Service`, a scripts `ConfigMap`, a config
//! `ConfigMap`, a `Secret` with the cluster secret and bootstrap key, and the
//! `StatefulSet` running go-ipfs and ipfs-cluster peers. Children carry owner
//! references, so deleting the `Ipfs` object removes them.
//!
//! ## Modules
//!
//! - [`crd`] - The `Ipfs` Custom Resource Definition
//! - [`reconcilers`] - Reconcile engine, finalizers and create-or-patch
//! - [`ipfs_resources`] - Pure builders for the child objects
//! - [`identity`] - Peer keypair and cluster secret generation
//! - [`store`] - Object store abstraction over the API server
//! - [`controller`] - `kube::runtime::Controller` binding
//!
//! ## Example
//!
//! ```rust,no_run
//! use ipfs_operator::crd::{Ipfs, IpfsSpec};
//! use ipfs_operator::identity::{IdentitySource, SeededIdentitySource};
//! use ipfs_operator::ipfs_resources::{build_child_resources, WorkloadDefaults};
//!
//! let mut ipfs = Ipfs::new("ipfs-sample", IpfsSpec::default());
//! ipfs.metadata.namespace = Some("demo".to_string());
//!
//! let identity = SeededIdentitySource::new(1).generate().unwrap();
//! let children = build_child_resources(&ipfs, &identity, &WorkloadDefaults::default());
//! assert_eq!(
//!     children.stateful_set.metadata.name.as_deref(),
//!     Some("ipfs-cluster-ipfs-sample")
//! );
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod identity;
pub mod ipfs_resources;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod store;
