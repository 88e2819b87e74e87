// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ipfs.rs`
//!
//! Full reconciliation passes are exercised against an in-memory store in
//! `tests/reconcile_integration.rs`.

#[cfg(test)]
mod tests {
    use crate::constants::{KEY_BOOTSTRAP_PEER_PRIV_KEY, KEY_CLUSTER_SECRET};
    use crate::errors::IdentityError;
    use crate::identity::{IdentitySource, SeededIdentitySource};
    use crate::reconcilers::ipfs::{persisted_identity, ReconcileOutcome};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret_with(entries: &[(&str, &str)]) -> Secret {
        let data: BTreeMap<String, ByteString> = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        Secret {
            data: Some(data),
            ..Default::default()
        }
    }

    #[test]
    fn test_persisted_identity_round_trips() {
        let identity = SeededIdentitySource::new(5).generate().unwrap();
        let private_key = identity.private_key_base64();
        let secret = secret_with(&[
            (KEY_BOOTSTRAP_PEER_PRIV_KEY, private_key.as_str()),
            (KEY_CLUSTER_SECRET, identity.cluster_secret.as_str()),
        ]);

        let recovered = persisted_identity(&secret).unwrap().unwrap();
        assert_eq!(recovered, identity);
    }

    #[test]
    fn test_missing_keys_mean_no_persisted_identity() {
        assert!(persisted_identity(&Secret::default()).is_none());

        let identity = SeededIdentitySource::new(6).generate().unwrap();
        let only_secret = secret_with(&[(KEY_CLUSTER_SECRET, identity.cluster_secret.as_str())]);
        assert!(persisted_identity(&only_secret).is_none());
    }

    #[test]
    fn test_corrupt_secret_is_reported() {
        let secret = secret_with(&[
            (KEY_BOOTSTRAP_PEER_PRIV_KEY, "bm90IGEga2V5"),
            (KEY_CLUSTER_SECRET, "deadbeef"),
        ]);

        let result = persisted_identity(&secret).unwrap();
        assert!(matches!(result, Err(IdentityError::InvalidKey(_))));
    }

    #[test]
    fn test_non_utf8_secret_is_reported() {
        let mut data = BTreeMap::new();
        data.insert(
            KEY_BOOTSTRAP_PEER_PRIV_KEY.to_string(),
            ByteString(vec![0xff, 0xfe]),
        );
        data.insert(KEY_CLUSTER_SECRET.to_string(), ByteString(vec![0x00]));
        let secret = Secret {
            data: Some(data),
            ..Default::default()
        };

        assert!(persisted_identity(&secret).unwrap().is_err());
    }

    #[test]
    fn test_outcome_is_requeue() {
        assert!(ReconcileOutcome::Requeue.is_requeue());
        assert!(!ReconcileOutcome::Done.is_requeue());
    }
}
