// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `Ipfs` controller.
//!
//! Every reconciliation receives an `Arc<Context>` that contains:
//! - The object store used for all reads and writes
//! - The identity source used when a cluster has no persisted identity yet
//! - Operator-wide workload defaults (container images)
//!
//! Nothing in the context is mutated by a reconciliation pass, so passes for
//! different objects can run concurrently against one shared context.

use crate::identity::{IdentitySource, ProcessIdentitySource};
use crate::ipfs_resources::WorkloadDefaults;
use crate::store::{KubeStore, ObjectStore};
use kube::Client;
use std::sync::Arc;

/// Shared context passed to every reconciliation.
#[derive(Clone)]
pub struct Context<S: ObjectStore = KubeStore> {
    /// Object store for API operations
    pub store: S,

    /// Generator for new cluster identities
    pub identity: Arc<dyn IdentitySource>,

    /// Images used when the `Ipfs` spec does not override them
    pub defaults: WorkloadDefaults,
}

impl<S: ObjectStore> Context<S> {
    /// Assemble a context from its parts.
    #[must_use]
    pub fn new(store: S, identity: Arc<dyn IdentitySource>, defaults: WorkloadDefaults) -> Self {
        Self {
            store,
            identity,
            defaults,
        }
    }
}

impl Context<KubeStore> {
    /// Production context: API server store and process-seeded identities.
    #[must_use]
    pub fn for_client(client: Client, defaults: WorkloadDefaults) -> Self {
        Self::new(
            KubeStore::new(client),
            Arc::new(ProcessIdentitySource),
            defaults,
        )
    }
}
