// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{API_GROUP_VERSION, KIND_IPFS};
    use crate::crd::{ImageConfig, Ipfs, IpfsSpec};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::{CustomResourceExt, Resource};
    use serde_json::json;

    #[test]
    fn test_spec_defaults_when_fields_omitted() {
        let spec: IpfsSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec, IpfsSpec::default());
        assert_eq!(spec.replicas, 1);
        assert_eq!(spec.ipfs_storage, Quantity("10Gi".to_string()));
        assert_eq!(spec.cluster_storage, Quantity("5Gi".to_string()));
        assert!(spec.image.is_none());
    }

    #[test]
    fn test_spec_uses_camel_case() {
        let spec: IpfsSpec = serde_json::from_value(json!({
            "replicas": 3,
            "ipfsStorage": "100Gi",
            "clusterStorage": "2Gi",
            "image": { "ipfs": "ipfs/kubo:v0.20.0", "imagePullPolicy": "Always" }
        }))
        .unwrap();

        assert_eq!(spec.replicas, 3);
        assert_eq!(spec.ipfs_storage.0, "100Gi");
        assert_eq!(spec.cluster_storage.0, "2Gi");
        assert_eq!(
            spec.image,
            Some(ImageConfig {
                ipfs: Some("ipfs/kubo:v0.20.0".to_string()),
                cluster: None,
                image_pull_policy: Some("Always".to_string()),
            })
        );

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["ipfsStorage"], "100Gi");
        assert_eq!(value["image"]["imagePullPolicy"], "Always");
        assert!(value["image"].get("cluster").is_none());
    }

    #[test]
    fn test_effective_replicas_floor() {
        for (replicas, expected) in [(-2, 1), (0, 1), (1, 1), (4, 4)] {
            let spec = IpfsSpec {
                replicas,
                ..Default::default()
            };
            assert_eq!(spec.effective_replicas(), expected, "replicas = {replicas}");
        }
    }

    #[test]
    fn test_crd_identity() {
        let crd = Ipfs::crd();
        assert_eq!(crd.metadata.name.as_deref(), Some("ipfs.cluster.ipfs.io"));
        assert_eq!(crd.spec.group, "cluster.ipfs.io");
        assert_eq!(crd.spec.names.kind, "Ipfs");
        assert_eq!(crd.spec.names.plural, "ipfs");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.versions.len(), 1);
        assert_eq!(crd.spec.versions[0].name, "v1alpha1");
    }

    #[test]
    fn test_owner_reference_constants_match_crd() {
        assert_eq!(Ipfs::api_version(&()), API_GROUP_VERSION);
        assert_eq!(Ipfs::kind(&()), KIND_IPFS);
    }
}
