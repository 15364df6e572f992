//! Contract tests for VersionClient.
//!
//! These tests pin down the backend behaviour the engine relies on, using
//! the in-memory fake. Any conforming backend must pass them.

use blockdef_client::fakes::MemoryVersionClient;
use blockdef_client::{ClientError, VersionClient, VersionState};
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// list_versions
// ===========================================================================

#[tokio::test]
async fn new_definition_owns_draft_version_one() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");

    let versions = client.list_versions(def).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].number, 1);
    assert_eq!(versions[0].state, VersionState::Draft);
    assert_eq!(versions[0].definition, def);
}

#[tokio::test]
async fn list_unknown_definition_fails() {
    let client = MemoryVersionClient::new();
    let err = client.list_versions(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ClientError::DefinitionNotFound { .. }));
}

#[tokio::test]
async fn stored_payload_echoes_control_fields() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");
    let v1 = client.list_versions(def).await.unwrap().remove(0);

    let updated = client
        .update_version(v1.uuid, "ws-1", &json!({"implementation": {"type": "job"}}))
        .await
        .unwrap();

    assert_eq!(updated.payload["number"], json!(1));
    assert_eq!(updated.payload["state"], json!("draft"));
    assert_eq!(updated.payload["definition"], json!(def.to_string()));
    assert_eq!(updated.payload["implementation"]["type"], json!("job"));
}

// ===========================================================================
// create_version / update_version
// ===========================================================================

#[tokio::test]
async fn create_version_numbers_after_max() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");
    let v1 = client.list_versions(def).await.unwrap().remove(0);
    client
        .update_version(v1.uuid, "ws-1", &json!({"state": "released"}))
        .await
        .unwrap();

    let v2 = client.create_version(def, &json!({"inputs": []})).await.unwrap();
    assert_eq!(v2.number, 2);
    assert_eq!(v2.state, VersionState::Draft);
}

#[tokio::test]
async fn release_request_without_approval_releases() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");
    let v1 = client.list_versions(def).await.unwrap().remove(0);

    let released = client
        .update_version(v1.uuid, "ws-1", &json!({"state": "released"}))
        .await
        .unwrap();
    assert_eq!(released.state, VersionState::Released);
}

#[tokio::test]
async fn release_request_with_approval_waits_in_review() {
    let client = MemoryVersionClient::new().with_required_approval();
    let def = client.create_definition("ws-1");
    let v1 = client.list_versions(def).await.unwrap().remove(0);

    let pending = client
        .update_version(v1.uuid, "ws-1", &json!({"state": "released"}))
        .await
        .unwrap();
    assert_eq!(pending.state, VersionState::InReview);

    let approved = client.approve(v1.uuid).unwrap();
    assert_eq!(approved.state, VersionState::Released);
}

#[tokio::test]
async fn released_version_rejects_update() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");
    let v1 = client.list_versions(def).await.unwrap().remove(0);
    client
        .update_version(v1.uuid, "ws-1", &json!({"state": "released"}))
        .await
        .unwrap();

    let err = client
        .update_version(v1.uuid, "ws-1", &json!({"inputs": [1]}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::VersionImmutable {
            state: VersionState::Released,
            ..
        }
    ));
}

#[tokio::test]
async fn update_from_foreign_workspace_fails() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");
    let v1 = client.list_versions(def).await.unwrap().remove(0);

    let err = client
        .update_version(v1.uuid, "ws-2", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::WorkspaceMismatch { .. }));
}

#[tokio::test]
async fn outage_fails_every_call_and_is_logged() {
    let client = MemoryVersionClient::new();
    let def = client.create_definition("ws-1");
    client.set_unavailable(true);

    let err = client.list_versions(def).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(client.calls(), vec!["list_versions".to_string()]);
}

#[tokio::test]
async fn injected_field_lands_in_stored_payload() {
    let client = MemoryVersionClient::new().with_injected_field("extra", json!("surprise"));
    let def = client.create_definition("ws-1");

    let v2 = client.create_version(def, &json!({})).await.unwrap();
    assert_eq!(v2.payload["extra"], json!("surprise"));
}

#[test]
fn version_state_wire_format() {
    assert_eq!(
        serde_json::to_string(&VersionState::InReview).unwrap(),
        "\"in_review\""
    );
    assert_eq!(VersionState::parse("released"), Some(VersionState::Released));
    assert_eq!(VersionState::parse("published"), None);
}
