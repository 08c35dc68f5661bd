#![cfg(unix)]
mod support;

use std::path::Path;
use std::time::{Duration, Instant};

use hardhat_panel::bridge::Bridge;
use hardhat_panel::config::ProbeMode;
use hardhat_panel::probe::{probe_installation, probe_network};
use hardhat_panel::toolchain::Toolchain;
use hardhat_panel::ProcessState;
use url::Url;

#[test]
fn status_of_plain_directory_reports_no_project() {
    let fake = support::fake_toolchain();
    let bridge = Bridge::new(support::settings_for(&fake.program, &support::unused_endpoint())).unwrap();
    let proj = tempfile::tempdir().unwrap();

    let status = bridge.check_status(Some(proj.path())).unwrap();
    assert!(status.installed);
    assert_eq!(status.version.as_deref(), Some(support::FAKE_VERSION));
    assert!(!status.project_detected);
    assert_eq!(status.project_path, None);
    assert!(!status.network_running);
    assert_eq!(status.network_state, Some(ProcessState::Stopped));
    assert!(bridge.registry().active().is_none());
}

#[test]
fn missing_launcher_is_not_installed_without_error() {
    let mut settings = support::settings_for(Path::new("/nonexistent/fakehat"), &support::unused_endpoint());
    settings.toolchain.program = "hardhat-panel-no-such-launcher".to_string();
    let bridge = Bridge::new(settings.clone()).unwrap();
    let status = bridge.check_status(None).unwrap();
    assert!(!status.installed);
    assert_eq!(status.version, None);

    let probe = probe_installation(&Toolchain::new(settings.toolchain), Duration::from_secs(2));
    assert!(!probe.installed);
}

#[test]
fn unreachable_endpoint_answers_within_timeout() {
    let url = Url::parse(&support::unused_endpoint()).unwrap();
    let started = Instant::now();
    let probe = probe_network(&url, ProbeMode::JsonRpc, Duration::from_millis(300));
    assert!(!probe.reachable);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn listening_endpoint_is_reachable_over_tcp() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    assert!(probe_network(&url, ProbeMode::Tcp, Duration::from_secs(1)).reachable);
}

#[test]
fn detected_project_becomes_active() {
    let fake = support::fake_toolchain();
    let bridge = Bridge::new(support::settings_for(&fake.program, &support::unused_endpoint())).unwrap();
    let proj = tempfile::tempdir().unwrap();
    std::fs::write(proj.path().join("hardhat.config.ts"), "export default {};").unwrap();

    let status = bridge.check_status(Some(proj.path())).unwrap();
    let canon = std::fs::canonicalize(proj.path()).unwrap();
    assert!(status.project_detected);
    assert_eq!(status.project_path.as_deref(), Some(canon.as_path()));
    assert_eq!(bridge.registry().active(), Some(canon));
}
