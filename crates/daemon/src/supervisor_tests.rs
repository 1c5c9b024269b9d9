// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

use kagent_core::command::GIT_OPS_SYNC_EVENT;
use kagent_core::SyncEvent;

use crate::adapters::{FakeClusterApplier, FakeRepoFactory};
use crate::engine::test_helpers::{config_map, settings, MARKER};

struct Setup {
    factory: FakeRepoFactory,
    cluster: FakeClusterApplier,
    supervisor: NamespaceSupervisor,
    responses: mpsc::Receiver<Packet>,
    shutdown: CancellationToken,
}

fn setup() -> Setup {
    let factory = FakeRepoFactory::new();
    let cluster = FakeClusterApplier::new();
    let (responses_tx, responses) = mpsc::channel(64);
    let shutdown = CancellationToken::new();
    let supervisor = NamespaceSupervisor::new(
        Arc::new(factory.clone()),
        Syncer::new(Arc::new(cluster.clone())),
        responses_tx,
        settings(),
        shutdown.clone(),
    );
    Setup { factory, cluster, supervisor, responses, shutdown }
}

fn env(namespace: &str) -> EnvParas {
    EnvParas {
        namespace: namespace.to_string(),
        env_id: 7,
        git_rsa_key: String::new(),
        git_url: format!("git@host:{}.git", namespace),
        releases: vec![],
    }
}

async fn next_event(responses: &mut mpsc::Receiver<Packet>) -> Packet {
    tokio::time::timeout(Duration::from_secs(10), responses.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn add_get_and_list() {
    let s = setup();
    s.supervisor.add(env("team-b")).unwrap();
    s.supervisor.add(env("team-a")).unwrap();

    assert_eq!(s.supervisor.namespaces(), vec!["team-a", "team-b"]);
    let handle = s.supervisor.get("team-a").unwrap();
    assert_eq!(handle.env.git_url, "git@host:team-a.git");
    assert_eq!(handle.stats().passes, 0);
    assert!(s.supervisor.get("team-c").is_none());
    s.supervisor.shutdown().await;
}

#[tokio::test]
async fn duplicate_add_is_rejected() {
    let s = setup();
    s.supervisor.add(env("team-a")).unwrap();
    let err = s.supervisor.add(env("team-a")).err().unwrap();
    assert!(matches!(err, SupervisorError::AlreadyManaged(ns) if ns == "team-a"));
    assert_eq!(s.supervisor.namespaces().len(), 1);
    s.supervisor.shutdown().await;
}

#[tokio::test]
async fn invalid_env_is_rejected_without_state_change() {
    let s = setup();
    assert!(matches!(s.supervisor.add(env("")), Err(SupervisorError::MissingNamespace)));

    s.factory.fail_open(true);
    assert!(matches!(s.supervisor.add(env("team-a")), Err(SupervisorError::Open { .. })));
    assert!(s.supervisor.namespaces().is_empty());
}

#[tokio::test]
async fn remove_waits_for_tasks_and_stops_watcher() {
    let s = setup();
    s.supervisor.add(env("team-a")).unwrap();
    let repo = s.factory.repo("team-a");

    // Let the watcher register its notification sender
    for _ in 0..100 {
        if repo.notify_change() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let removed = s.supervisor.remove("team-a").await.unwrap();

    assert_eq!(removed.namespace, "team-a");
    assert!(s.supervisor.get("team-a").is_none());
    assert!(!repo.notify_change(), "watcher must be stopped");
}

#[tokio::test]
async fn remove_unknown_namespace_fails() {
    let s = setup();
    let err = s.supervisor.remove("ghost").await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotManaged(ns) if ns == "ghost"));
}

#[tokio::test]
async fn sync_soon_requires_managed_namespace() {
    let s = setup();
    assert!(matches!(s.supervisor.sync_soon("ghost"), Err(SupervisorError::NotManaged(_))));

    s.supervisor.add(env("team-a")).unwrap();
    for _ in 0..5 {
        s.supervisor.sync_soon("team-a").unwrap();
    }
    s.supervisor.shutdown().await;
}

#[tokio::test]
async fn first_sync_of_new_environment_tracks_every_file() {
    let mut s = setup();
    let repo = s.factory.repo("teamA");
    repo.commit(&[("deploy.yaml", config_map("web", "1").as_str())]);
    repo.commit(&[("service.yaml", config_map("svc", "1").as_str())]);
    let secret = r#"{"apiVersion":"v1","kind":"Secret","metadata":{"name":"app"}}"#;
    let head = repo.commit(&[("config/app.json", secret)]);
    repo.set_tag(MARKER, &head);

    let mut teama = env("teamA");
    teama.git_url = "git@host:teamA.git".to_string();
    s.supervisor.add(teama).unwrap();
    s.supervisor.sync_soon("teamA").unwrap();

    let packet = next_event(&mut s.responses).await;
    assert_eq!(packet.packet_type, GIT_OPS_SYNC_EVENT);
    assert_eq!(packet.namespace(), "teamA");
    let event: SyncEvent = packet.decode().unwrap();
    assert!(event.metadata.errors.is_empty(), "errors: {:?}", event.metadata.errors);
    assert_eq!(event.metadata.commit, head);
    let files: Vec<_> = event.metadata.file_commits.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(files, vec!["config/app.json", "deploy.yaml", "service.yaml"]);
    assert_eq!(s.cluster.live_ids("teamA").len(), 3);

    s.supervisor.shutdown().await;
    assert!(s.supervisor.namespaces().is_empty());
}

#[tokio::test]
async fn process_shutdown_stops_every_loop() {
    let s = setup();
    s.supervisor.add(env("team-a")).unwrap();
    s.supervisor.add(env("team-b")).unwrap();

    s.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), s.supervisor.shutdown()).await.unwrap();
    assert!(s.supervisor.namespaces().is_empty());
}
