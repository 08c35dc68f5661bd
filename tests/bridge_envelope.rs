#![cfg(unix)]
mod support;

use hardhat_panel::bridge::Bridge;
use hardhat_panel::ErrorKind;
use serde_json::json;

fn bridge() -> (support::FakeToolchain, Bridge) {
    let fake = support::fake_toolchain();
    let b = Bridge::new(support::settings_for(&fake.program, &support::unused_endpoint())).unwrap();
    (fake, b)
}

#[test]
fn unknown_command_is_invalid_request_with_echoed_id() {
    let (_fake, b) = bridge();
    let env = b.handle_json(json!({"id": "req-1", "command": "mine_block", "args": {}}));
    assert!(!env.ok);
    assert_eq!(env.error_kind, Some(ErrorKind::InvalidRequest));
    assert_eq!(env.id, Some(json!("req-1")));
    assert!(env.message.unwrap().contains("mine_block"));
}

#[test]
fn create_then_status_detects_project() {
    let (_fake, b) = bridge();
    let root = tempfile::tempdir().unwrap();
    let proj = root.path().join("proj");

    let before = b.handle_json(json!({"command": "check_status", "args": {"project_path": proj}}));
    assert!(before.ok);
    let data = before.data.unwrap();
    assert_eq!(data["project_detected"], false);
    assert_eq!(data["project_path"], serde_json::Value::Null);

    let created = b.handle_json(json!({"id": 2, "command": "create_project", "args": {"project_path": proj}}));
    assert!(created.ok, "{created:?}");
    assert_eq!(created.data.unwrap()["success"], true);

    let after = b.handle_json(json!({"command": "check_status", "args": {"project_path": proj}}));
    let data = after.data.unwrap();
    assert_eq!(data["project_detected"], true);
    assert_eq!(data["installed"], true);
    assert_eq!(data["network_running"], false);
    assert_eq!(data["network_state"], "stopped");
}

#[test]
fn failed_command_is_ok_envelope_with_unsuccessful_result() {
    let (_fake, b) = bridge();
    let proj = tempfile::tempdir().unwrap();
    std::fs::write(proj.path().join("hardhat.config.js"), "").unwrap();
    let env = b.handle_json(json!({
        "command": "run_task",
        "args": {"project_path": proj.path(), "task": "fail"}
    }));
    assert!(env.ok);
    let data = env.data.unwrap();
    assert_eq!(data["success"], false);
    assert_eq!(data["exit_code"], 2);
    assert_eq!(data["error_kind"], "non_zero_exit");
}

#[test]
fn commands_without_any_project_are_project_not_found() {
    let (_fake, b) = bridge();
    let env = b.handle_json(json!({"command": "compile"}));
    assert_eq!(env.error_kind, Some(ErrorKind::ProjectNotFound));

    let bare = tempfile::tempdir().unwrap();
    let env = b.handle_json(json!({"command": "select_project", "args": {"project_path": bare.path()}}));
    assert_eq!(env.error_kind, Some(ErrorKind::ProjectNotFound));
    assert!(b.registry().active().is_none());
}

#[test]
fn select_project_sets_the_default_for_later_requests() {
    let (_fake, b) = bridge();
    let proj = tempfile::tempdir().unwrap();
    std::fs::write(proj.path().join("hardhat.config.js"), "").unwrap();

    let env = b.handle_json(json!({"command": "select_project", "args": {"project_path": proj.path()}}));
    assert!(env.ok);
    assert_eq!(env.data.unwrap()["config_file"], "hardhat.config.js");

    let env = b.handle_json(json!({"command": "deploy", "args": {}}));
    assert!(env.ok);
    assert_eq!(env.data.unwrap()["stdout"], "ran scripts/deploy.js on localhost\n");
}

#[test]
fn malformed_arguments_are_invalid_request() {
    let (_fake, b) = bridge();
    for raw in [
        json!({"command": "console_eval", "args": {"project_path": "/tmp"}}),
        json!({"command": "create_project", "args": "nope"}),
        json!({"command": 42}),
        json!("check_status"),
    ] {
        let env = b.handle_json(raw.clone());
        assert_eq!(env.error_kind, Some(ErrorKind::InvalidRequest), "{raw}");
    }
}
