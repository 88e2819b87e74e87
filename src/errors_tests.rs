// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use crate::errors::StoreError;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("{reason} message"),
            reason: reason.to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    #[test]
    fn test_404_maps_to_not_found() {
        let err = StoreError::from_kube(api_error(404, "NotFound"), "Service", "demo", "svc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Service demo/svc not found");
    }

    #[test]
    fn test_409_already_exists_maps_to_already_exists() {
        let err = StoreError::from_kube(
            api_error(409, "AlreadyExists"),
            "ConfigMap",
            "demo",
            "cm",
        );
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_409_conflict_maps_to_conflict() {
        let err = StoreError::from_kube(api_error(409, "Conflict"), "Ipfs", "demo", "x");
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(!err.is_already_exists());
        assert_eq!(err.kind_label(), "conflict");
    }

    #[test]
    fn test_other_status_maps_to_api() {
        let err = StoreError::from_kube(
            api_error(503, "ServiceUnavailable"),
            "Secret",
            "demo",
            "s",
        );
        match err {
            StoreError::Api { code, reason, .. } => {
                assert_eq!(code, 503);
                assert_eq!(reason, "ServiceUnavailable");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_serde_json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::from(json_err);
        assert_eq!(err.kind_label(), "serialization");
    }
}
