// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::ClusterCall;
use crate::dispatch::test_helpers::{command, env, response, Harness};
use crate::engine::test_helpers::config_map;
use kagent_core::command::{RESOURCE_DELETE, RESOURCE_DELETE_FAILED};

fn seeded() -> Harness {
    let h = Harness::new();
    h.ctx.supervisor.add(env("team-a")).unwrap();
    let live = Resource::parse_documents("cluster", config_map("web", "1").as_bytes(), "team-a")
        .unwrap()
        .remove(0);
    h.cluster.insert("team-a", live);
    h
}

fn request(name: &str, namespace: Option<&str>) -> Packet {
    let payload = ResourceDeletePayload {
        api_version: "v1".to_string(),
        kind: "ConfigMap".to_string(),
        name: name.to_string(),
        namespace: namespace.map(str::to_string),
    };
    command("cluster:1.env:team-a.res:9", RESOURCE_DELETE, &payload)
}

#[tokio::test]
async fn deletes_live_object() {
    let h = seeded();

    let outcome = h.handle(&ResourceDeleteHandler, request("web", None)).await;

    let answer = response(&outcome);
    assert_eq!(answer.packet_type, RESOURCE_DELETE_SUCCEEDED);
    assert_eq!(answer.key, "cluster:1.env:team-a.res:9");
    assert_eq!(answer.payload, r#"{"resourceId":"team-a:configmap/web"}"#);
    assert!(h.cluster.live_ids("team-a").is_empty());
    assert!(h.cluster.calls().contains(&ClusterCall::Delete {
        namespace: "team-a".to_string(),
        id: "team-a:configmap/web".to_string(),
    }));
    h.shutdown().await;
}

#[tokio::test]
async fn payload_namespace_must_be_managed() {
    let h = seeded();

    let outcome = h.handle(&ResourceDeleteHandler, request("web", Some("team-b"))).await;

    let answer = response(&outcome);
    assert_eq!(answer.packet_type, RESOURCE_DELETE_FAILED);
    assert!(answer.payload.contains("team-b"));
    assert!(h.cluster.calls().is_empty());
    assert_eq!(h.cluster.live_ids("team-a").len(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn cluster_failure_is_reported_with_resource_id() {
    let h = seeded();
    h.cluster.fail_resource("team-a:configmap/web");

    let outcome = h.handle(&ResourceDeleteHandler, request("web", None)).await;

    let answer = response(&outcome);
    assert_eq!(answer.packet_type, RESOURCE_DELETE_FAILED);
    assert!(answer.payload.starts_with("team-a:configmap/web: "), "payload: {}", answer.payload);
    h.shutdown().await;
}

#[tokio::test]
async fn missing_name_fails_before_touching_cluster() {
    let h = seeded();

    let outcome = h.handle(&ResourceDeleteHandler, request("", None)).await;

    assert_eq!(response(&outcome).packet_type, RESOURCE_DELETE_FAILED);
    assert!(h.cluster.calls().is_empty());
    h.shutdown().await;
}

#[test]
fn target_names_the_object() {
    let payload = ResourceDeletePayload {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        name: "api".to_string(),
        namespace: None,
    };
    let resource = target(&payload, "team-a").unwrap();
    assert_eq!(resource.id.as_str(), "team-a:deployment/api");
    assert_eq!(resource.source, COMMAND_SOURCE);
    assert_eq!(resource.meta.identity.namespace.as_deref(), Some("team-a"));
}
