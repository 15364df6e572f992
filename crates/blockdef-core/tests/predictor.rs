use blockdef_core::{
    fingerprint, ConfigValue, DefinitionState, DesiredDefinition, DiagnosticKind, Knowable,
    PlanPredictor, PredictorConfig, Transition, VersionHistory, VersionRecord, VersionState,
};
use serde_json::json;
use uuid::Uuid;

fn record(number: u32, state: VersionState, content: &serde_json::Value) -> VersionRecord {
    VersionRecord {
        uuid: Uuid::new_v4(),
        number,
        state,
        content_hash: fingerprint(content).expect("fingerprint"),
    }
}

fn prior(draft: bool, content: serde_json::Value, versions: Vec<VersionRecord>) -> DefinitionState {
    let history = VersionHistory::new(versions).expect("history");
    let version_latest_release = history.latest_release().expect("release").cloned();
    DefinitionState {
        uuid: Uuid::new_v4(),
        workspace: "ws-1".to_string(),
        draft,
        version_spec: ConfigValue::from_json(&content),
        versions: history,
        version_latest_release,
    }
}

fn desired(value: serde_json::Value) -> DesiredDefinition {
    DesiredDefinition::new(ConfigValue::from_json(&value))
}

// ── Transitions ─────────────────────────────────────────────────────────

#[test]
fn released_then_draft_appends_new_draft() {
    let content = json!({"inputs": [{"name": "a"}]});
    let v1 = record(1, VersionState::Released, &content);
    let prior = prior(false, content, vec![v1.clone()]);

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"draft": true, "inputs": [{"name": "a"}, {"name": "b"}]})),
    );

    assert!(prediction.diagnostics.is_empty());
    let state = prediction.state.expect("predicted state");
    assert_eq!(state.transition, Some(Transition::CreateDraft));
    assert_eq!(state.versions.len(), 2);
    assert_eq!(state.versions[0].to_record(), Some(v1.clone()));
    let latest = &state.version_latest;
    assert_eq!(latest.uuid, Knowable::Unknown);
    assert_eq!(latest.number, Knowable::Known(2));
    assert_eq!(latest.state, Knowable::Known(VersionState::Draft));
    assert!(latest.content_hash.is_known());
    assert_eq!(state.version_latest_release, Knowable::Known(Some(v1)));
}

#[test]
fn draft_release_request_leaves_state_unknown() {
    let content = json!({"inputs": [{"name": "a"}]});
    let v1 = record(1, VersionState::Draft, &content);
    let prior = prior(true, content, vec![v1.clone()]);

    let prediction = PlanPredictor::default()
        .predict(&prior, &desired(json!({"draft": false, "inputs": [{"name": "a"}]})));

    let state = prediction.state.expect("predicted state");
    assert_eq!(state.transition, Some(Transition::Release));
    assert_eq!(state.version_latest.uuid, Knowable::Known(v1.uuid));
    assert_eq!(state.version_latest.state, Knowable::Unknown);
    assert_eq!(state.version_latest.content_hash, Knowable::Known(v1.content_hash));
    assert_eq!(state.version_latest_release, Knowable::Unknown);
}

#[test]
fn released_with_changed_content_is_refused() {
    let content = json!({"inputs": [{"name": "a"}]});
    let prior = prior(
        false,
        content.clone(),
        vec![record(1, VersionState::Released, &content)],
    );
    let before = prior.clone();

    let prediction = PlanPredictor::default()
        .predict(&prior, &desired(json!({"draft": false, "inputs": [{"name": "z"}]})));

    assert!(prediction.state.is_none());
    assert!(prediction.diagnostics.has_errors());
    assert!(prediction
        .diagnostics
        .contains(DiagnosticKind::ImmutableVersionModified));
    assert_eq!(prior, before);
}

#[test]
fn released_with_same_content_is_unchanged() {
    let content = json!({"inputs": [{"name": "a"}]});
    let prior = prior(
        false,
        content.clone(),
        vec![record(1, VersionState::Released, &content)],
    );

    let prediction = PlanPredictor::default()
        .predict(&prior, &desired(json!({"draft": false, "inputs": [{"name": "a"}]})));

    let state = prediction.state.expect("predicted state");
    assert_eq!(state.transition, Some(Transition::Unchanged));
    assert_eq!(state.versions, prior.versions.planned());
}

// ── Unknown values ──────────────────────────────────────────────────────

#[test]
fn unknown_draft_flag_warns_and_hides_latest() {
    let content = json!({"inputs": [{"name": "a"}]});
    let prior = prior(
        true,
        content.clone(),
        vec![
            record(1, VersionState::Released, &json!({"inputs": []})),
            record(2, VersionState::Draft, &content),
        ],
    );

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"draft": {"$unknown": true}, "inputs": [{"name": "a"}]})),
    );

    assert!(!prediction.diagnostics.has_errors());
    assert!(prediction.diagnostics.contains(DiagnosticKind::DraftFlagUnknown));
    let state = prediction.state.expect("predicted state");
    assert_eq!(state.transition, None);
    assert_eq!(state.version_latest.uuid, Knowable::Unknown);
    assert_eq!(state.version_latest.number, Knowable::Unknown);
    assert_eq!(state.version_latest.state, Knowable::Unknown);
    assert!(state.version_latest.content_hash.is_known());
    assert_eq!(state.version_latest_release, Knowable::Unknown);
    assert!(state.versions[0].is_fully_known());
}

#[test]
fn unknown_content_makes_hash_unknown() {
    let content = json!({"inputs": [{"name": "a"}]});
    let prior = prior(true, content.clone(), vec![record(1, VersionState::Draft, &content)]);

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"inputs": [{"name": {"$unknown": true}}]})),
    );

    let state = prediction.state.expect("predicted state");
    assert_eq!(state.transition, Some(Transition::UpdateDraft));
    assert_eq!(state.version_latest.content_hash, Knowable::Unknown);
    assert_eq!(state.version_latest.number, Knowable::Known(1));
}

#[test]
fn pending_secret_rotation_makes_hash_unknown() {
    let content = json!({"token": {"name": "t", "secret_ref": {"version": 1}}});
    let prior = prior(true, content.clone(), vec![record(1, VersionState::Draft, &content)]);

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"token": {"name": "t", "secret_ref": {"version": 2}}})),
    );

    let state = prediction.state.expect("predicted state");
    assert_eq!(state.version_latest.content_hash, Knowable::Unknown);
}

#[test]
fn released_secret_rotation_is_an_error() {
    let content = json!({"token": {"name": "t", "secret_ref": {"version": 1}}});
    let prior = prior(
        false,
        content.clone(),
        vec![record(1, VersionState::Released, &content)],
    );

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"draft": false, "token": {"name": "t", "secret_ref": {"version": 2}}})),
    );

    assert!(prediction.state.is_none());
    assert!(prediction
        .diagnostics
        .contains(DiagnosticKind::SecretRotationOnReleased));
}

#[test]
fn unknown_content_on_released_defers_immutability_check() {
    let content = json!({"inputs": [{"name": "a"}]});
    let prior = prior(
        false,
        content.clone(),
        vec![record(1, VersionState::Released, &content)],
    );

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"draft": false, "inputs": {"$unknown": true}})),
    );

    assert!(!prediction.diagnostics.has_errors());
    let state = prediction.state.expect("predicted state");
    assert_eq!(state.version_latest.content_hash, Knowable::Unknown);
}

// ── Configuration ───────────────────────────────────────────────────────

#[test]
fn renamed_draft_key_is_used() {
    let content = json!({"inputs": []});
    let prior = prior(true, content.clone(), vec![record(1, VersionState::Draft, &content)]);
    let predictor = PlanPredictor::new(PredictorConfig::default().with_draft_key("is_draft"));

    let prediction = predictor.predict(&prior, &desired(json!({"is_draft": false, "inputs": []})));

    assert_eq!(
        prediction.state.expect("predicted state").transition,
        Some(Transition::Release)
    );
}

#[test]
fn invalid_draft_flag_is_an_error() {
    let content = json!({"inputs": []});
    let prior = prior(true, content.clone(), vec![record(1, VersionState::Draft, &content)]);

    let prediction = PlanPredictor::default().predict(&prior, &desired(json!({"draft": "no"})));

    assert!(prediction.state.is_none());
    assert!(prediction.diagnostics.contains(DiagnosticKind::InvalidInput));
}

#[test]
fn draft_and_content_errors_are_reported_together() {
    let content = json!({"inputs": []});
    let prior = prior(true, content.clone(), vec![record(1, VersionState::Draft, &content)]);

    let prediction = PlanPredictor::default().predict(
        &prior,
        &desired(json!({"draft": "no", "inputs": [{"name": "t", "plaintext": "hunter2"}]})),
    );

    assert!(prediction.state.is_none());
    assert_eq!(prediction.diagnostics.errors().count(), 2);
    assert!(prediction.diagnostics.contains(DiagnosticKind::InvalidInput));
    assert!(prediction.diagnostics.contains(DiagnosticKind::DisallowedKey));
}
