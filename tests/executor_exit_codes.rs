#![cfg(unix)]
mod support;

use std::time::{Duration, Instant};

use hardhat_panel::bridge::{Bridge, Request};
use hardhat_panel::ErrorKind;

fn project_bridge() -> (support::FakeToolchain, tempfile::TempDir, Bridge) {
    let fake = support::fake_toolchain();
    let bridge = Bridge::new(support::settings_for(&fake.program, &support::unused_endpoint())).unwrap();
    let proj = tempfile::tempdir().unwrap();
    std::fs::write(proj.path().join("hardhat.config.js"), "module.exports = {};").unwrap();
    (fake, proj, bridge)
}

#[test]
fn exit_two_is_a_failed_result_not_an_error() {
    let (_fake, proj, bridge) = project_bridge();
    let r = bridge.run_task(Some(proj.path()), "fail", &[]).unwrap();
    assert!(!r.success);
    assert_eq!(r.exit_code, Some(2));
    assert_eq!(r.error_kind, Some(ErrorKind::NonZeroExit));
    assert!(r.stderr.contains("task failed"));
}

#[test]
fn console_source_is_fed_on_stdin() {
    let (_fake, proj, bridge) = project_bridge();
    let r = bridge
        .console_eval(Some(proj.path()), "await ethers.provider.getBlockNumber()")
        .unwrap();
    assert!(r.success);
    assert_eq!(r.stdout, "await ethers.provider.getBlockNumber()\n");
}

#[test]
fn deploy_defaults_script_and_network() {
    let (_fake, proj, bridge) = project_bridge();
    let r = bridge.deploy(Some(proj.path()), None).unwrap();
    assert!(r.success);
    assert_eq!(r.stdout.trim(), "ran scripts/deploy.js on localhost");

    let r = bridge.deploy(Some(proj.path()), Some("scripts/seed.ts")).unwrap();
    assert_eq!(r.stdout.trim(), "ran scripts/seed.ts on localhost");
}

#[test]
fn install_uses_the_installer_program() {
    let (_fake, _proj, bridge) = project_bridge();
    let r = bridge.install_toolchain().unwrap();
    assert!(r.success, "{r:?}");
    assert!(r.stdout.contains("added 1 package"));
}

#[test]
fn hung_command_times_out_and_is_killed() {
    let fake = support::fake_toolchain();
    let mut settings = support::settings_for(&fake.program, &support::unused_endpoint());
    settings.timeouts.command = Duration::from_secs(1);
    let bridge = Bridge::new(settings).unwrap();
    let proj = tempfile::tempdir().unwrap();
    std::fs::write(proj.path().join("hardhat.config.js"), "").unwrap();

    let started = Instant::now();
    let env = bridge.handle(Request::RunTask {
        project_path: Some(proj.path().to_path_buf()),
        task: "sleep".to_string(),
        args: Vec::new(),
    });
    assert!(!env.ok);
    assert_eq!(env.error_kind, Some(ErrorKind::Timeout));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn missing_launcher_is_not_installed_envelope() {
    let (_fake, proj, _) = project_bridge();
    let mut settings = support::settings_for(&proj.path().join("fakehat"), &support::unused_endpoint());
    settings.toolchain.program = "hardhat-panel-no-such-launcher".to_string();
    let bridge = Bridge::new(settings).unwrap();
    let env = bridge.handle(Request::Compile {
        project_path: Some(proj.path().to_path_buf()),
    });
    assert!(!env.ok);
    assert_eq!(env.error_kind, Some(ErrorKind::NotInstalled));
}

#[test]
fn invalid_task_names_are_rejected_before_spawning() {
    let (_fake, proj, bridge) = project_bridge();
    for bad in ["", "--network", "two words"] {
        let env = bridge.handle(Request::RunTask {
            project_path: Some(proj.path().to_path_buf()),
            task: bad.to_string(),
            args: Vec::new(),
        });
        assert_eq!(env.error_kind, Some(ErrorKind::InvalidRequest), "task {bad:?}");
    }
}
