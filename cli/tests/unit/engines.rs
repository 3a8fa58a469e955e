//! Engine calls routed through `dispatch::execute`.

#![allow(clippy::unwrap_used)]

use tgfleet_cli::application::services::dispatch::{self, EngineContext};
use tgfleet_cli::domain::settings::AgentSettings;
use tgfleet_cli::domain::{
    FailureKind, HostOperation, HostStatus, OperationResult, Outcome, Payload, PushOptions,
    ServiceAction,
};

use crate::mocks::{CONFIG_PATH, ScriptedTransport, host, output};

async fn execute(transport: &ScriptedTransport, op: HostOperation) -> OperationResult {
    let agent = AgentSettings::default();
    let ctx = EngineContext {
        transport,
        agent: &agent,
        status_cache: None,
    };
    dispatch::execute(ctx, &host("web-1"), &op).await
}

#[tokio::test]
async fn test_fetch_returns_file_verbatim() {
    let transport = ScriptedTransport::default().with_file("web-1", CONFIG_PATH, "[agent]\n");

    let result = execute(&transport, HostOperation::FetchConfig).await;

    let Some(Payload::Config(doc)) = result.payload() else {
        panic!("expected config payload, got {result:?}");
    };
    assert_eq!(doc.content, b"[agent]\n");
    assert_eq!(doc.path, CONFIG_PATH);
    assert_eq!(doc.source_host, "web-1");
}

#[tokio::test]
async fn test_fetch_missing_file_is_not_found() {
    let result = execute(&ScriptedTransport::default(), HostOperation::FetchConfig).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::NotFound));
}

#[tokio::test]
async fn test_push_with_backup_then_fetch_round_trips() {
    let transport = ScriptedTransport::default().with_file("web-1", CONFIG_PATH, "old");
    let push = HostOperation::PushConfig {
        candidate: "[agent]\ninterval = \"10s\"\n".to_string(),
        options: PushOptions {
            test_first: false,
            keep_backup: true,
        },
    };

    let result = execute(&transport, push).await;
    assert!(result.is_success(), "{result:?}");
    assert!(transport.commands().iter().any(|c| c.contains(".bak")));

    let fetched = execute(&transport, HostOperation::FetchConfig).await;
    let Some(Payload::Config(doc)) = fetched.payload() else {
        panic!("expected config payload");
    };
    assert_eq!(doc.text(), "[agent]\ninterval = \"10s\"\n");
}

#[tokio::test]
async fn test_push_refused_when_candidate_fails_agent_test() {
    let transport = ScriptedTransport::default()
        .with_file("web-1", CONFIG_PATH, "old")
        .respond("--test", output(1, "", "E! error parsing config"));
    let push = HostOperation::PushConfig {
        candidate: "[[inputs.cpu]\n".to_string(),
        options: PushOptions {
            test_first: true,
            keep_backup: false,
        },
    };

    let result = execute(&transport, push).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailed));
    assert_eq!(transport.file("web-1", CONFIG_PATH).unwrap(), b"old");
}

#[tokio::test]
async fn test_empty_push_is_rejected() {
    let push = HostOperation::PushConfig {
        candidate: "  \n".to_string(),
        options: PushOptions::default(),
    };
    let result = execute(&ScriptedTransport::default(), push).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailed));
}

#[tokio::test]
async fn test_deployed_config_test_reports_exit_code() {
    let transport =
        ScriptedTransport::default().respond("--test", output(1, "", "Error: no outputs found"));

    let result = execute(&transport, HostOperation::TestConfig { candidate: None }).await;

    let Outcome::Success {
        payload: Payload::TestReport(report),
    } = &result.outcome
    else {
        panic!("expected test report, got {result:?}");
    };
    assert!(!report.passed());
    assert!(report.display_text().contains("ERROR/INFO:"));
}

#[tokio::test]
async fn test_silent_agent_test_shows_placeholder() {
    let result = execute(
        &ScriptedTransport::default(),
        HostOperation::TestConfig { candidate: None },
    )
    .await;
    let Some(Payload::TestReport(report)) = result.payload() else {
        panic!("expected test report");
    };
    assert!(report.passed());
    assert!(report.display_text().contains("No output received"));
}

#[tokio::test]
async fn test_service_action_on_missing_unit_is_not_installed() {
    let transport = ScriptedTransport::default().respond(
        "systemctl show",
        output(0, "LoadState=not-found\nActiveState=inactive\n", ""),
    );

    let result = execute(&transport, HostOperation::ServiceAction(ServiceAction::Start)).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::NotInstalled));
    assert!(!transport.commands().iter().any(|c| c.contains("systemctl start")));
}

#[tokio::test]
async fn test_reload_of_stopped_service_is_not_running() {
    let transport = ScriptedTransport::default().respond(
        "systemctl show",
        output(
            0,
            "LoadState=loaded\nActiveState=inactive\nUnitFileState=enabled\n",
            "",
        ),
    );

    let result = execute(&transport, HostOperation::ServiceAction(ServiceAction::Reload)).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::NotRunning));
}

#[tokio::test]
async fn test_status_check_of_unreachable_host_is_down() {
    let transport = ScriptedTransport::default().unreachable("web-1");

    let result = execute(&transport, HostOperation::StatusCheck).await;

    let Some(Payload::Status(observation)) = result.payload() else {
        panic!("status checks always produce an observation, got {result:?}");
    };
    assert_eq!(observation.status, HostStatus::Down);
}
