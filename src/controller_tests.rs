// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `controller.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{DEFAULT_RESYNC_INTERVAL_SECS, IMMEDIATE_REQUEUE_SECS};
    use crate::controller::{action_for, owned_metadata};
    use crate::reconcilers::ReconcileOutcome;
    use futures::Stream;
    use k8s_openapi::api::apps::v1::StatefulSet;
    use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
    use kube::core::PartialObjectMeta;
    use kube::runtime::controller::Action;
    use kube::runtime::watcher;
    use kube::Api;
    use std::time::Duration;

    fn assert_metadata_only<K, S, F>(_: F)
    where
        F: Fn(Api<K>, watcher::Config) -> S,
        S: Stream<Item = Result<PartialObjectMeta<K>, watcher::Error>>,
    {
    }

    #[test]
    fn test_owned_watches_carry_metadata_only() {
        assert_metadata_only(owned_metadata::<StatefulSet>);
        assert_metadata_only(owned_metadata::<Service>);
        assert_metadata_only(owned_metadata::<ServiceAccount>);
        assert_metadata_only(owned_metadata::<Secret>);
        assert_metadata_only(owned_metadata::<ConfigMap>);
    }

    #[test]
    fn test_requeue_runs_again_after_short_delay() {
        assert_eq!(IMMEDIATE_REQUEUE_SECS, 1);
        let resync = Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS);
        assert_eq!(
            action_for(ReconcileOutcome::Requeue, resync),
            Action::requeue(Duration::from_secs(IMMEDIATE_REQUEUE_SECS))
        );
    }

    #[test]
    fn test_done_waits_for_resync() {
        let resync = Duration::from_secs(42);
        assert_eq!(
            action_for(ReconcileOutcome::Done, resync),
            Action::requeue(resync)
        );
    }
}
