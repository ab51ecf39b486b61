//! End-to-end invocation through RunService with replayed device sessions

use std::collections::BTreeMap;
use std::sync::Arc;

use netops_workflow::domain::{
    BranchArm, DeviceId, ErrorKind, ExecutionRequest, RunStatus, Stage, WorkflowError, WorkflowId,
    WorkflowRepository,
};
use netops_workflow::infrastructure::device::{ReplayScript, ReplaySessionProvider};
use netops_workflow::infrastructure::workflow::{
    parse_workflow, DefinitionFormat, InMemoryWorkflowRepository,
};
use netops_workflow::{create_run_service, AppConfig, RunService};

const VLAN_WORKFLOW: &str = r#"
id = "assign-vlan"
name = "Assign access VLAN"
status = "active"

[[pre_check]]
command = "show vlan id {{vlan_id}}"
match = { operator = "not_contains", pattern = "not found" }

[[pre_check]]
command = "show running-config interface {{interface}}"
match = { operator = "matches", pattern = 'switchport access vlan (\d+)' }
variable_binding = { name = "previous_vlan" }

[[implementation]]
command = "interface {{interface}}\nswitchport access vlan {{vlan_id}}"

[[post_check]]
command = "show interfaces {{interface}} switchport"
match = { operator = "contains", pattern = "Access Mode VLAN: {{vlan_id}}" }

[post_check.condition]
type = "if_output_contains"
text = "err-disabled"
then = [{ command = "interface {{interface}}\nshutdown\nno shutdown" }]

[[rollback]]
command = "interface {{interface}}\nswitchport access vlan {previous_vlan}"
"#;

const RESPONSES: &str = r#"{
  "responses": {
    "show vlan id 120": { "output": "120  users  active" },
    "show running-config interface Gi1/0/7": { "output": "interface Gi1/0/7\n switchport access vlan 10\n" },
    "interface Gi1/0/7\nswitchport access vlan 120": { "output": "" },
    "interface Gi1/0/7\nswitchport access vlan 10": { "output": "" },
    "interface Gi1/0/7\nshutdown\nno shutdown": { "output": "" }
  }
}"#;

fn service(responses: ReplayScript) -> (RunService, ReplaySessionProvider) {
    let workflow = parse_workflow(VLAN_WORKFLOW, DefinitionFormat::Toml).unwrap();
    let provider = ReplaySessionProvider::new(responses);
    let service = create_run_service(
        &AppConfig::default(),
        Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow])),
        Arc::new(provider.clone()),
    )
    .unwrap();
    (service, provider)
}

fn script(post_check_output: &str) -> ReplayScript {
    let mut json: serde_json::Value = serde_json::from_str(RESPONSES).unwrap();
    json["responses"]["show interfaces Gi1/0/7 switchport"] =
        serde_json::json!({ "output": post_check_output });
    ReplayScript::from_json(&json.to_string()).unwrap()
}

fn request() -> ExecutionRequest {
    ExecutionRequest::new(WorkflowId::new("assign-vlan").unwrap(), "access-sw-3")
        .with_param("vlan_id", "120")
        .with_param("interface", "Gi1/0/7")
}

#[tokio::test]
async fn completes_and_persists_every_step() {
    let (service, provider) = service(script("Access Mode VLAN: 120 (users)"));

    let run = service.execute(request()).await.unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(run.steps().len(), 4);
    assert_eq!(run.steps_for(Stage::Rollback).count(), 0);
    assert_eq!(
        run.steps()[1].extracted_value.as_deref(),
        Some("10"),
        "previous VLAN captured from running config"
    );
    assert_eq!(
        provider.commands_sent(&DeviceId::new("access-sw-3"))[2],
        "interface Gi1/0/7\nswitchport access vlan 120"
    );

    let stored = service.get_run(run.id()).await.unwrap().unwrap();
    assert_eq!(stored, run);
    assert!(stored.completed_at().is_some());
}

#[tokio::test]
async fn post_check_failure_restores_previous_vlan() {
    let (service, provider) = service(script("Access Mode VLAN: 10 (legacy)"));

    let run = service.execute(request()).await.unwrap();

    assert_eq!(run.status(), RunStatus::RolledBack);
    let failure = run.failure().unwrap();
    assert_eq!(failure.stage, Stage::PostCheck);
    assert_eq!(failure.kind, ErrorKind::MatchFailure);

    let sent = provider.commands_sent(&DeviceId::new("access-sw-3"));
    assert_eq!(
        sent.last().map(String::as_str),
        Some("interface Gi1/0/7\nswitchport access vlan 10")
    );
    assert_eq!(sent.len(), 5);
}

#[tokio::test]
async fn err_disabled_port_is_bounced() {
    let (service, provider) = service(script("Access Mode VLAN: 120\nerr-disabled"));

    let run = service.execute(request()).await.unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    let branch_step = run.steps().last().unwrap();
    assert_eq!(branch_step.branch.unwrap().arm, BranchArm::Then);
    assert_eq!(branch_step.stage, Stage::PostCheck);
    assert_eq!(
        provider.commands_sent(&DeviceId::new("access-sw-3")).len(),
        5
    );
}

#[tokio::test]
async fn missing_parameter_is_rejected_before_contact() {
    let (service, provider) = service(script(""));

    let request = ExecutionRequest::new(WorkflowId::new("assign-vlan").unwrap(), "access-sw-3")
        .with_params(BTreeMap::from([("vlan_id".to_string(), "120".to_string())]));
    let err = service.execute(request).await.unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("interface"));
    assert!(provider.transcript().is_empty());
    assert!(
        service
            .list_runs(&WorkflowId::new("assign-vlan").unwrap())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn required_params_in_first_appearance_order() {
    let (service, _) = service(script(""));

    let params = service
        .required_params(&WorkflowId::new("assign-vlan").unwrap())
        .await
        .unwrap();
    assert_eq!(params, vec!["vlan_id", "interface"]);
}

#[tokio::test]
async fn paused_workflow_is_rejected() {
    let workflows = Arc::new(InMemoryWorkflowRepository::new());
    let definition = VLAN_WORKFLOW.replace("status = \"active\"", "status = \"paused\"");
    workflows
        .create(parse_workflow(&definition, DefinitionFormat::Toml).unwrap())
        .await
        .unwrap();
    let service = create_run_service(
        &AppConfig::default(),
        workflows,
        Arc::new(ReplaySessionProvider::new(script(""))),
    )
    .unwrap();

    let err = service.execute(request()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn concurrent_runs_on_different_devices() {
    let (service, provider) = service(script("Access Mode VLAN: 120"));
    let service = Arc::new(service);

    let a = service.spawn(request()).await.unwrap();
    let mut other = request();
    other.device_id = DeviceId::new("access-sw-4");
    let b = service.spawn(other).await.unwrap();

    let run_a = a.task.await.unwrap().unwrap();
    let run_b = b.task.await.unwrap().unwrap();

    assert_eq!(run_a.status(), RunStatus::Completed);
    assert_eq!(run_b.status(), RunStatus::Completed);
    assert_eq!(provider.commands_sent(&DeviceId::new("access-sw-4")).len(), 4);
}

#[tokio::test]
async fn second_run_on_busy_device_is_refused() {
    let (service, _) = service(
        ReplayScript::from_json(
            r#"{ "default": { "output": "Access Mode VLAN: 120", "delay_ms": 50 } }"#,
        )
        .unwrap(),
    );
    let service = Arc::new(service);

    let first = service.spawn(request()).await.unwrap();
    let err = service.execute(request()).await.unwrap_err();

    assert!(matches!(err, WorkflowError::SessionUnavailable { .. }));
    first.task.await.unwrap().unwrap();
}
