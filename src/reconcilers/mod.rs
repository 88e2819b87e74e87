// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for `Ipfs` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard level-triggered controller pattern:
//!
//! 1. **Watch** - Monitor `Ipfs` objects and the children they own
//! 2. **Reconcile** - Compare the desired children with what the cluster holds
//! 3. **Converge** - Create or merge-patch each child toward its desired form
//!
//! # Modules
//!
//! - [`ipfs`] - The reconcile engine, [`reconcile_ipfs`]
//! - [`finalizers`] - Finalizer state machine and transitions
//! - [`resources`] - Create-or-patch for a single child object
//!
//! # Example: Running one pass
//!
//! ```rust,no_run
//! use ipfs_operator::context::Context;
//! use ipfs_operator::ipfs_resources::WorkloadDefaults;
//! use ipfs_operator::reconcilers::{reconcile_ipfs, ReconcileOutcome};
//! use kube::Client;
//!
//! async fn one_pass() -> anyhow::Result<()> {
//!     let client = Client::try_default().await?;
//!     let ctx = Context::for_client(client, WorkloadDefaults::default());
//!
//!     if reconcile_ipfs(&ctx, "demo", "ipfs-sample").await? == ReconcileOutcome::Requeue {
//!         println!("another pass is needed");
//!     }
//!     Ok(())
//! }
//! ```

pub mod finalizers;
pub mod ipfs;
pub mod resources;

pub use ipfs::{reconcile_ipfs, ReconcileOutcome};
pub use resources::{create_or_patch, ApplyOutcome};
