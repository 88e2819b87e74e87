// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants applied to every resource created by the operator.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Label Values
// ============================================================================

/// Application name for IPFS cluster pods
pub const APP_NAME_IPFS_CLUSTER: &str = "ipfs-cluster";

/// Component value for the storage cluster
pub const COMPONENT_STORAGE_CLUSTER: &str = "storage-cluster";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_IPFS_OPERATOR: &str = "ipfs-operator";

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_IPFS: &str = "ipfs";
