// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! IPFS cluster Kubernetes resource builders
//!
//! This module computes the desired state of every child object of an [`Ipfs`]
//! resource: `ServiceAccount`, `Service`, the scripts and config `ConfigMaps`,
//! the cluster `Secret` and the `StatefulSet`. All functions are pure; the same
//! `Ipfs` object and identity material always produce the same children.

use crate::constants::{
    API_GROUP_VERSION, CLUSTER_API_PORT, CLUSTER_DATA_PATH, CLUSTER_MONITOR_PING_INTERVAL,
    CLUSTER_NAME_PREFIX, CLUSTER_PROXY_PORT, CLUSTER_SWARM_PORT, CONFIG_CONFIGMAP_PREFIX,
    CONFIG_SECRET_PREFIX, DEFAULT_IMAGE_PULL_POLICY, DEFAULT_IPFS_CLUSTER_IMAGE,
    DEFAULT_IPFS_IMAGE, IPFS_API_PORT, IPFS_DATA_PATH, IPFS_GATEWAY_PORT, IPFS_SWARM_PORT,
    IPFS_SWARM_UDP_PORT, IPFS_WS_PORT, KEY_BOOTSTRAP_PEER_ID, KEY_BOOTSTRAP_PEER_PRIV_KEY,
    KEY_CLUSTER_SECRET, KEY_CONFIGURE_IPFS_SCRIPT, KEY_ENTRYPOINT_SCRIPT, KIND_IPFS,
    SCRIPTS_CONFIGMAP_PREFIX, SCRIPTS_DEFAULT_MODE, SCRIPTS_MOUNT_PATH,
};
use crate::crd::Ipfs;
use crate::identity::{IdentityMaterial, PeerId};
use crate::labels::{
    APP_NAME_IPFS_CLUSTER, COMPONENT_STORAGE_CLUSTER, K8S_COMPONENT, K8S_INSTANCE,
    K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF, MANAGED_BY_IPFS_OPERATOR, PART_OF_IPFS,
};
use k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetSpec},
    core::v1::{
        ConfigMap, ConfigMapKeySelector, ConfigMapVolumeSource, Container, ContainerPort,
        EnvVar, EnvVarSource, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec,
        PodTemplateSpec, Secret, SecretKeySelector, Service, ServiceAccount, ServicePort,
        ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
    },
};
use k8s_openapi::apimachinery::pkg::{
    api::resource::Quantity,
    apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
    util::intstr::IntOrString,
};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

// Embed scripts at compile time
const ENTRYPOINT_TEMPLATE: &str = include_str!("../templates/entrypoint.sh.tmpl");
const CONFIGURE_IPFS_TEMPLATE: &str = include_str!("../templates/configure-ipfs.sh.tmpl");

// Container names
const CONTAINER_NAME_IPFS: &str = "ipfs";
const CONTAINER_NAME_CLUSTER: &str = "ipfs-cluster";
const CONTAINER_NAME_CONFIGURE: &str = "configure-ipfs";

// Volume names
const VOLUME_SCRIPTS: &str = "configure-script";
const VOLUME_IPFS_STORAGE: &str = "ipfs-storage";
const VOLUME_CLUSTER_STORAGE: &str = "cluster-storage";

/// Names of every child object of one `Ipfs` resource.
///
/// Names depend only on the parent name, so repeated passes always address the
/// same objects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildNames {
    pub service_account: String,
    pub service: String,
    pub scripts_config_map: String,
    pub config_config_map: String,
    pub secret: String,
    pub stateful_set: String,
}

impl ChildNames {
    /// Derive child names for the `Ipfs` resource named `name`.
    #[must_use]
    pub fn for_ipfs(name: &str) -> Self {
        let cluster = format!("{CLUSTER_NAME_PREFIX}-{name}");
        Self {
            service_account: cluster.clone(),
            service: cluster.clone(),
            scripts_config_map: format!("{SCRIPTS_CONFIGMAP_PREFIX}-{name}"),
            config_config_map: format!("{CONFIG_CONFIGMAP_PREFIX}-{name}"),
            secret: format!("{CONFIG_SECRET_PREFIX}-{name}"),
            stateful_set: cluster,
        }
    }
}

/// Operator-wide workload settings used when the `Ipfs` spec does not override them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadDefaults {
    pub ipfs_image: String,
    pub cluster_image: String,
    pub image_pull_policy: String,
}

impl Default for WorkloadDefaults {
    fn default() -> Self {
        Self {
            ipfs_image: DEFAULT_IPFS_IMAGE.to_string(),
            cluster_image: DEFAULT_IPFS_CLUSTER_IMAGE.to_string(),
            image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
        }
    }
}

/// The full desired state for one `Ipfs` resource.
#[derive(Clone, Debug)]
pub struct ChildResources {
    pub service_account: ServiceAccount,
    pub service: Service,
    pub scripts_config_map: ConfigMap,
    pub config_config_map: ConfigMap,
    pub secret: Secret,
    pub stateful_set: StatefulSet,
}

/// Builds standardized Kubernetes labels for resources owned by an `Ipfs`.
///
/// # Arguments
///
/// * `ipfs_name` - Name of the `Ipfs` resource
///
/// # Returns
///
/// A `BTreeMap` of label key-value pairs
#[must_use]
pub fn build_labels(ipfs_name: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(ipfs_name);
    labels.insert(K8S_COMPONENT.into(), COMPONENT_STORAGE_CLUSTER.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_IPFS_OPERATOR.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_IPFS.into());
    labels
}

/// Labels selecting the pods of one `Ipfs` cluster.
///
/// Kept to the two labels that never change, since a `StatefulSet` selector is
/// immutable once created.
#[must_use]
pub fn selector_labels(ipfs_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(K8S_NAME.into(), APP_NAME_IPFS_CLUSTER.into());
    labels.insert(K8S_INSTANCE.into(), ipfs_name.into());
    labels
}

/// Builds owner references for a resource owned by an `Ipfs`
///
/// Sets up cascade deletion so that when the `Ipfs` is deleted, all of its
/// children are garbage-collected.
#[must_use]
pub fn build_owner_references(ipfs: &Ipfs) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_IPFS.to_string(),
        name: ipfs.name_any(),
        uid: ipfs.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

fn child_metadata(name: &str, ipfs: &Ipfs) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: ipfs.namespace(),
        labels: Some(build_labels(&ipfs.name_any())),
        owner_references: Some(build_owner_references(ipfs)),
        ..Default::default()
    }
}

/// Builds the `ServiceAccount` the cluster pods run as.
#[must_use]
pub fn build_service_account(ipfs: &Ipfs) -> ServiceAccount {
    let names = ChildNames::for_ipfs(&ipfs.name_any());
    ServiceAccount {
        metadata: child_metadata(&names.service_account, ipfs),
        ..Default::default()
    }
}

fn service_port(name: &str, port: u16, protocol: &str) -> ServicePort {
    ServicePort {
        name: Some(name.into()),
        port: i32::from(port),
        target_port: Some(IntOrString::Int(i32::from(port))),
        protocol: Some(protocol.into()),
        ..Default::default()
    }
}

/// Builds the headless `Service` governing the cluster `StatefulSet`.
///
/// Peers resolve each other through the per-pod DNS records this service
/// publishes (`<service>-0.<service>`), including before the pods are ready.
#[must_use]
pub fn build_service(ipfs: &Ipfs) -> Service {
    let name = ipfs.name_any();
    let names = ChildNames::for_ipfs(&name);

    Service {
        metadata: child_metadata(&names.service, ipfs),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(&name)),
            cluster_ip: Some("None".into()),
            publish_not_ready_addresses: Some(true),
            ports: Some(vec![
                service_port("swarm", IPFS_SWARM_PORT, "TCP"),
                service_port("swarm-udp", IPFS_SWARM_UDP_PORT, "UDP"),
                service_port("http", IPFS_GATEWAY_PORT, "TCP"),
                service_port("ws", IPFS_WS_PORT, "TCP"),
                service_port("api-http", CLUSTER_API_PORT, "TCP"),
                service_port("proxy-http", CLUSTER_PROXY_PORT, "TCP"),
                service_port("cluster-swarm", CLUSTER_SWARM_PORT, "TCP"),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Convert a Kubernetes storage quantity into the go-ipfs `Datastore.StorageMax` form.
///
/// Binary suffixes become their decimal-unit spelling (`10Gi` -> `10GB`), which
/// keeps the datastore limit at or below the volume size. Quantities without a
/// recognised suffix are passed through unchanged.
#[must_use]
pub fn datastore_storage_max(quantity: &Quantity) -> String {
    let raw = quantity.0.trim();
    let digits_end = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (amount, suffix) = raw.split_at(digits_end);

    let unit = match suffix {
        "Ki" | "k" => "KB",
        "Mi" | "M" => "MB",
        "Gi" | "G" => "GB",
        "Ti" | "T" => "TB",
        "Pi" | "P" => "PB",
        "" => "B",
        _ => return raw.to_string(),
    };

    if amount.is_empty() {
        return raw.to_string();
    }
    format!("{amount}{unit}")
}

fn render_entrypoint() -> String {
    ENTRYPOINT_TEMPLATE
        .replace("{{CLUSTER_DATA_PATH}}", CLUSTER_DATA_PATH)
        .replace("{{CLUSTER_SWARM_PORT}}", &CLUSTER_SWARM_PORT.to_string())
        .replace("{{CLUSTER_API_PORT}}", &CLUSTER_API_PORT.to_string())
}

fn render_configure_ipfs(ipfs: &Ipfs) -> String {
    CONFIGURE_IPFS_TEMPLATE
        .replace("{{IPFS_DATA_PATH}}", IPFS_DATA_PATH)
        .replace("{{IPFS_API_PORT}}", &IPFS_API_PORT.to_string())
        .replace("{{IPFS_GATEWAY_PORT}}", &IPFS_GATEWAY_PORT.to_string())
        .replace("{{IPFS_SWARM_PORT}}", &IPFS_SWARM_PORT.to_string())
        .replace("{{IPFS_SWARM_UDP_PORT}}", &IPFS_SWARM_UDP_PORT.to_string())
        .replace("{{IPFS_WS_PORT}}", &IPFS_WS_PORT.to_string())
        .replace(
            "{{STORAGE_MAX}}",
            &datastore_storage_max(&ipfs.spec.ipfs_storage),
        )
}

/// Builds the `ConfigMap` holding the peer bootstrap scripts.
///
/// Creates a `ConfigMap` with:
/// - `entrypoint.sh` - ipfs-cluster start-up; ordinal 0 is the bootstrap peer
/// - `configure-ipfs.sh` - go-ipfs repository initialisation
#[must_use]
pub fn build_scripts_configmap(ipfs: &Ipfs) -> ConfigMap {
    let names = ChildNames::for_ipfs(&ipfs.name_any());

    let mut data = BTreeMap::new();
    data.insert(KEY_ENTRYPOINT_SCRIPT.to_string(), render_entrypoint());
    data.insert(
        KEY_CONFIGURE_IPFS_SCRIPT.to_string(),
        render_configure_ipfs(ipfs),
    );

    ConfigMap {
        metadata: child_metadata(&names.scripts_config_map, ipfs),
        data: Some(data),
        ..Default::default()
    }
}

/// Builds the `ConfigMap` publishing the bootstrap peer id.
#[must_use]
pub fn build_config_configmap(ipfs: &Ipfs, peer_id: &PeerId) -> ConfigMap {
    let names = ChildNames::for_ipfs(&ipfs.name_any());

    let mut data = BTreeMap::new();
    data.insert(KEY_BOOTSTRAP_PEER_ID.to_string(), peer_id.to_string());

    ConfigMap {
        metadata: child_metadata(&names.config_config_map, ipfs),
        data: Some(data),
        ..Default::default()
    }
}

/// Builds the `Secret` holding the cluster secret and the bootstrap private key.
///
/// Values go into `data` rather than `stringData`, so the object read back
/// from the API server compares equal to the desired one.
#[must_use]
pub fn build_secret(ipfs: &Ipfs, identity: &IdentityMaterial) -> Secret {
    let names = ChildNames::for_ipfs(&ipfs.name_any());

    let mut data = BTreeMap::new();
    data.insert(
        KEY_CLUSTER_SECRET.to_string(),
        ByteString(identity.cluster_secret.clone().into_bytes()),
    );
    data.insert(
        KEY_BOOTSTRAP_PEER_PRIV_KEY.to_string(),
        ByteString(identity.private_key_base64().into_bytes()),
    );

    Secret {
        metadata: child_metadata(&names.secret, ipfs),
        data: Some(data),
        type_: Some("Opaque".into()),
        ..Default::default()
    }
}

fn env_value(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn env_from_config_map(name: &str, config_map: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: config_map.to_string(),
                key: key.to_string(),
                optional: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn container_port(name: &str, port: u16, protocol: &str) -> ContainerPort {
    ContainerPort {
        name: Some(name.into()),
        container_port: i32::from(port),
        protocol: Some(protocol.into()),
        ..Default::default()
    }
}

fn volume_mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.into(),
        mount_path: mount_path.into(),
        ..Default::default()
    }
}

fn volume_claim_template(name: &str, storage: &Quantity) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), storage.clone());

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.into()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".into()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds the pod specification: init container, go-ipfs and ipfs-cluster.
fn build_pod_spec(ipfs: &Ipfs, names: &ChildNames, defaults: &WorkloadDefaults) -> PodSpec {
    let image_config = ipfs.spec.image.as_ref();

    let ipfs_image = image_config
        .and_then(|cfg| cfg.ipfs.clone())
        .unwrap_or_else(|| defaults.ipfs_image.clone());
    let cluster_image = image_config
        .and_then(|cfg| cfg.cluster.clone())
        .unwrap_or_else(|| defaults.cluster_image.clone());
    let image_pull_policy = image_config
        .and_then(|cfg| cfg.image_pull_policy.clone())
        .unwrap_or_else(|| defaults.image_pull_policy.clone());

    let configure_container = Container {
        name: CONTAINER_NAME_CONFIGURE.into(),
        image: Some(ipfs_image.clone()),
        image_pull_policy: Some(image_pull_policy.clone()),
        command: Some(vec![
            "sh".into(),
            format!("{SCRIPTS_MOUNT_PATH}/{KEY_CONFIGURE_IPFS_SCRIPT}"),
        ]),
        volume_mounts: Some(vec![
            volume_mount(VOLUME_IPFS_STORAGE, IPFS_DATA_PATH),
            volume_mount(VOLUME_SCRIPTS, SCRIPTS_MOUNT_PATH),
        ]),
        ..Default::default()
    };

    let ipfs_container = Container {
        name: CONTAINER_NAME_IPFS.into(),
        image: Some(ipfs_image),
        image_pull_policy: Some(image_pull_policy.clone()),
        env: Some(vec![env_value("IPFS_FD_MAX", "4096")]),
        ports: Some(vec![
            container_port("swarm", IPFS_SWARM_PORT, "TCP"),
            container_port("swarm-udp", IPFS_SWARM_UDP_PORT, "UDP"),
            container_port("api", IPFS_API_PORT, "TCP"),
            container_port("http", IPFS_GATEWAY_PORT, "TCP"),
            container_port("ws", IPFS_WS_PORT, "TCP"),
        ]),
        volume_mounts: Some(vec![volume_mount(VOLUME_IPFS_STORAGE, IPFS_DATA_PATH)]),
        ..Default::default()
    };

    let cluster_container = Container {
        name: CONTAINER_NAME_CLUSTER.into(),
        image: Some(cluster_image),
        image_pull_policy: Some(image_pull_policy),
        command: Some(vec![
            "sh".into(),
            format!("{SCRIPTS_MOUNT_PATH}/{KEY_ENTRYPOINT_SCRIPT}"),
        ]),
        env: Some(vec![
            env_from_config_map(
                KEY_BOOTSTRAP_PEER_ID,
                &names.config_config_map,
                KEY_BOOTSTRAP_PEER_ID,
            ),
            env_from_secret(
                KEY_BOOTSTRAP_PEER_PRIV_KEY,
                &names.secret,
                KEY_BOOTSTRAP_PEER_PRIV_KEY,
            ),
            env_from_secret(KEY_CLUSTER_SECRET, &names.secret, KEY_CLUSTER_SECRET),
            env_value("SVC_NAME", names.service.clone()),
            env_value(
                "CLUSTER_IPFSHTTP_NODEMULTIADDRESS",
                format!("/ip4/127.0.0.1/tcp/{IPFS_API_PORT}"),
            ),
            env_value(
                "CLUSTER_RESTAPI_HTTPLISTENMULTIADDRESS",
                format!("/ip4/0.0.0.0/tcp/{CLUSTER_API_PORT}"),
            ),
            env_value("CLUSTER_CRDT_TRUSTEDPEERS", "*"),
            env_value("CLUSTER_MONITOR_PING_INTERVAL", CLUSTER_MONITOR_PING_INTERVAL),
        ]),
        ports: Some(vec![
            container_port("api-http", CLUSTER_API_PORT, "TCP"),
            container_port("proxy-http", CLUSTER_PROXY_PORT, "TCP"),
            container_port("cluster-swarm", CLUSTER_SWARM_PORT, "TCP"),
        ]),
        volume_mounts: Some(vec![
            volume_mount(VOLUME_CLUSTER_STORAGE, CLUSTER_DATA_PATH),
            volume_mount(VOLUME_SCRIPTS, SCRIPTS_MOUNT_PATH),
        ]),
        ..Default::default()
    };

    PodSpec {
        service_account_name: Some(names.service_account.clone()),
        init_containers: Some(vec![configure_container]),
        containers: vec![ipfs_container, cluster_container],
        volumes: Some(vec![Volume {
            name: VOLUME_SCRIPTS.into(),
            config_map: Some(ConfigMapVolumeSource {
                name: names.scripts_config_map.clone(),
                default_mode: Some(SCRIPTS_DEFAULT_MODE),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Builds the `StatefulSet` running the cluster peers.
///
/// Each replica gets its own `ipfs-storage` and `cluster-storage` volume
/// claims sized from the `Ipfs` spec.
#[must_use]
pub fn build_stateful_set(ipfs: &Ipfs, defaults: &WorkloadDefaults) -> StatefulSet {
    let name = ipfs.name_any();
    let names = ChildNames::for_ipfs(&name);
    let replicas = ipfs.spec.effective_replicas();

    debug!(
        name = %names.stateful_set,
        namespace = ?ipfs.namespace(),
        replicas,
        "Building StatefulSet for Ipfs"
    );

    StatefulSet {
        metadata: child_metadata(&names.stateful_set, ipfs),
        spec: Some(StatefulSetSpec {
            service_name: Some(names.service.clone()),
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(build_labels(&name)),
                    ..Default::default()
                }),
                spec: Some(build_pod_spec(ipfs, &names, defaults)),
            },
            volume_claim_templates: Some(vec![
                volume_claim_template(VOLUME_IPFS_STORAGE, &ipfs.spec.ipfs_storage),
                volume_claim_template(VOLUME_CLUSTER_STORAGE, &ipfs.spec.cluster_storage),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Compute the complete desired state for an `Ipfs` resource.
#[must_use]
pub fn build_child_resources(
    ipfs: &Ipfs,
    identity: &IdentityMaterial,
    defaults: &WorkloadDefaults,
) -> ChildResources {
    ChildResources {
        service_account: build_service_account(ipfs),
        service: build_service(ipfs),
        scripts_config_map: build_scripts_configmap(ipfs),
        config_config_map: build_config_configmap(ipfs, &identity.peer_id),
        secret: build_secret(ipfs, identity),
        stateful_set: build_stateful_set(ipfs, defaults),
    }
}

#[cfg(test)]
#[path = "ipfs_resources_tests.rs"]
mod ipfs_resources_tests;
