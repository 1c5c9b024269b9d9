// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

use kagent_core::Resource;

use crate::adapters::{ClusterCall, FakeClusterApplier};

fn config_map(namespace: &str, name: &str) -> Resource {
    let yaml = format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {}\n", name);
    Resource::parse_documents(&format!("{}.yaml", name), yaml.as_bytes(), namespace)
        .unwrap()
        .remove(0)
}

fn setup() -> (FakeClusterApplier, Syncer) {
    let cluster = FakeClusterApplier::new();
    let syncer = Syncer::new(Arc::new(cluster.clone()));
    (cluster, syncer)
}

#[tokio::test]
async fn empty_batch_touches_nothing() {
    let (cluster, syncer) = setup();
    syncer.sync("team-a", SyncDef::default()).await.unwrap();
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn applies_and_deletes_in_one_batch() {
    let (cluster, syncer) = setup();
    let stale = config_map("team-a", "stale");
    cluster.insert("team-a", stale.clone());

    let def = SyncDef::new(vec![config_map("team-a", "web")], vec![stale]);
    syncer.sync("team-a", def).await.unwrap();

    assert_eq!(cluster.live_ids("team-a"), vec!["team-a:configmap/web"]);
}

#[tokio::test]
async fn unparseable_action_is_skipped_and_reported() {
    let (cluster, syncer) = setup();
    let mut broken = config_map("team-a", "b");
    broken.bytes = b"{ not: [valid".to_vec();
    let def = SyncDef::new(
        vec![config_map("team-a", "a"), broken, config_map("team-a", "c")],
        vec![],
    );

    let errors = syncer.sync("team-a", def).await.unwrap_err();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors.failures()[0].resource.id.as_str(), "team-a:configmap/b");
    let applied: Vec<_> = cluster
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ClusterCall::Apply { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(applied, vec!["team-a:configmap/a", "team-a:configmap/c"]);
}

#[tokio::test]
async fn applier_failures_are_aggregated() {
    let (cluster, syncer) = setup();
    cluster.fail_resource("team-a:configmap/a");
    let mut missing_kind = config_map("team-a", "b");
    missing_kind.bytes = b"apiVersion: v1\nmetadata:\n  name: b\n".to_vec();
    let def = SyncDef::new(vec![config_map("team-a", "a"), missing_kind], vec![]);

    let errors = syncer.sync("team-a", def).await.unwrap_err();

    let mut ids: Vec<_> = errors.failures().iter().map(|f| f.resource.id.to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["team-a:configmap/a", "team-a:configmap/b"]);
    assert!(errors.failures().iter().all(|f| !f.error.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn batches_from_different_namespaces_never_overlap() {
    let (cluster, syncer) = setup();
    cluster.set_delay(Duration::from_millis(100));

    let tasks: Vec<_> = ["team-a", "team-b", "team-c"]
        .into_iter()
        .map(|ns| {
            let syncer = syncer.clone();
            tokio::spawn(async move {
                syncer.sync(ns, SyncDef::new(vec![config_map(ns, "web")], vec![])).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(cluster.max_in_flight(), 1);
    assert_eq!(cluster.live_ids("team-b"), vec!["team-b:configmap/web"]);
}
