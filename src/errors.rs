// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the IPFS operator.
//!
//! This module provides specialized error types for:
//! - Object store operations (get, create, patch, update against the API server)
//! - Peer identity generation and decoding
//! - Reconciliation passes that cannot proceed
//!
//! Store errors are classified so the reconcile engine can tell the expected
//! `AlreadyExists` race apart from transient failures that warrant a requeue.

use thiserror::Error;

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested object does not exist (HTTP 404).
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespace that was searched
        namespace: String,
        /// Name of the missing object
        name: String,
    },

    /// An object with the same identity already exists (HTTP 409, reason `AlreadyExists`).
    ///
    /// Expected during create-or-patch; it triggers the patch fallback.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Kind of the existing object
        kind: String,
        /// Namespace of the existing object
        namespace: String,
        /// Name of the existing object
        name: String,
    },

    /// Optimistic concurrency failure: the object changed since it was read (HTTP 409).
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        /// Kind of the contended object
        kind: String,
        /// Namespace of the contended object
        namespace: String,
        /// Name of the contended object
        name: String,
        /// Message reported by the store
        message: String,
    },

    /// Any other error status reported by the API server.
    #[error("API error {code} ({reason}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Machine-readable reason
        reason: String,
        /// Human-readable message
        message: String,
    },

    /// The store could not be reached (connection refused, timeout, TLS failure).
    #[error("store unavailable: {0}")]
    Transport(String),

    /// An object could not be converted to or from its wire form.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// An object is missing metadata required to address it.
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

impl StoreError {
    /// Map a `kube::Error` for an operation on `kind` `namespace/name`.
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(ae) => match (ae.code, ae.reason.as_str()) {
                (404, _) => Self::NotFound {
                    kind: kind.to_string(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                },
                (409, "AlreadyExists") => Self::AlreadyExists {
                    kind: kind.to_string(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                },
                (409, _) => Self::Conflict {
                    kind: kind.to_string(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    message: ae.message,
                },
                (code, _) => Self::Api {
                    code,
                    reason: ae.reason,
                    message: ae.message,
                },
            },
            kube::Error::SerdeError(e) => Self::Serialization(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }

    /// Whether this error reports an existing object with the same identity.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether this error reports a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short label used for metrics and structured logs.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::Api { .. } => "api",
            Self::Transport(_) => "transport",
            Self::Serialization(_) => "serialization",
            Self::MissingMetadata(_) => "missing_metadata",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised while generating or decoding peer identity material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The random source failed to produce bytes.
    #[error("entropy source failed: {0}")]
    Entropy(String),

    /// The process-wide random source was used before it was seeded.
    #[error("process random source has not been seeded")]
    Unseeded,

    /// The process-wide random source lock was poisoned by a panicking holder.
    #[error("process random source lock poisoned")]
    Poisoned,

    /// Key bytes did not decode to a valid Ed25519 key.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The peer id multihash could not be built.
    #[error("peer id encoding failed: {0}")]
    PeerId(String),
}

/// Errors that abort a reconciliation pass.
///
/// Failures of individual child resources never surface here; they are logged
/// and folded into a requeue request instead.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Reading the `Ipfs` object failed for a reason other than absence.
    #[error("failed to get Ipfs {namespace}/{name}: {source}")]
    Fetch {
        /// Namespace of the `Ipfs` object
        namespace: String,
        /// Name of the `Ipfs` object
        name: String,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Reading the cluster `Secret` that persists identity material failed.
    #[error("failed to read identity Secret {namespace}/{name}: {source}")]
    IdentityLookup {
        /// Namespace of the `Secret`
        namespace: String,
        /// Name of the `Secret`
        name: String,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Fresh identity material could not be generated.
    #[error("failed to generate cluster identity: {0}")]
    Identity(#[from] IdentityError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
