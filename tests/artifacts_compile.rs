#![cfg(unix)]
mod support;

use hardhat_panel::bridge::Bridge;

#[test]
fn compile_flips_every_source_to_compiled() {
    let fake = support::fake_toolchain();
    let bridge = Bridge::new(support::settings_for(&fake.program, &support::unused_endpoint())).unwrap();
    let root = tempfile::tempdir().unwrap();
    let proj = root.path().join("nested").join("dapp");

    let created = bridge.create_project(&proj).unwrap();
    assert!(created.success, "{created:?}");

    let before = bridge.list_artifacts(Some(&proj)).unwrap();
    let names: Vec<&str> = before.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Lock", "Token"]);
    assert!(before.iter().all(|a| !a.compiled && a.size_bytes.is_none()));

    let compiled = bridge.compile(Some(&proj)).unwrap();
    assert!(compiled.success);
    assert!(compiled.stdout.contains("Compiled"));

    let after = bridge.list_artifacts(Some(&proj)).unwrap();
    assert_eq!(after.len(), 2);
    for a in &after {
        assert!(a.compiled, "{} not compiled", a.name);
        let expected = format!("{{\"contractName\":\"{}\",\"abi\":[]}}\n", a.name).len() as u64;
        assert_eq!(a.size_bytes, Some(expected));
    }
}

#[test]
fn artifacts_use_the_active_project_when_path_is_omitted() {
    let fake = support::fake_toolchain();
    let bridge = Bridge::new(support::settings_for(&fake.program, &support::unused_endpoint())).unwrap();
    let proj = tempfile::tempdir().unwrap();
    bridge.create_project(proj.path()).unwrap();

    let items = bridge.list_artifacts(None).unwrap();
    assert_eq!(items.len(), 2);
    let tests = bridge.run_tests(None).unwrap();
    assert!(tests.stdout.contains("2 passing"));
}
