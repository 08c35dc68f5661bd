/*!
Test support helpers shared across integration tests.

- fake_toolchain(): a scripted `/bin/sh` stand-in for the toolchain launcher
- settings_for(..): Settings wired to a fake toolchain and a private endpoint
- unused_endpoint(): an http URL nobody listens on
- wait_until(..): poll a condition with a deadline

The fake launcher understands: `--version`, `init`, `compile`, `test`, `run`,
`console` (echoes stdin), `fail` (exit 2), `sleep`, `install-global` and `node`
(appends to `.node-spawns` in its cwd, prints one line, then sleeps).
*/
#![allow(dead_code)]

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hardhat_panel::config::{ProbeMode, Settings};

pub const FAKE_VERSION: &str = "2.22.17";

const FAKE_SCRIPT: &str = r#"#!/bin/sh
[ "$1" = "hardhat" ] && shift
case "$1" in
  --version)
    echo "2.22.17"
    ;;
  install-global)
    echo "added 1 package"
    ;;
  init)
    echo "module.exports = { solidity: '0.8.24' };" > hardhat.config.js
    mkdir -p contracts
    echo "contract Lock {}" > contracts/Lock.sol
    echo "contract Token {}" > contracts/Token.sol
    echo "Project created"
    ;;
  compile)
    for f in contracts/*.sol; do
      n=$(basename "$f" .sol)
      mkdir -p "artifacts/contracts/$n.sol"
      echo '{"contractName":"'"$n"'","abi":[]}' > "artifacts/contracts/$n.sol/$n.json"
      echo '{}' > "artifacts/contracts/$n.sol/$n.dbg.json"
    done
    echo "Compiled 2 Solidity files successfully"
    ;;
  test)
    echo "  2 passing"
    ;;
  run)
    echo "ran $2 on $4"
    ;;
  console)
    cat
    ;;
  fail)
    echo "task failed" >&2
    exit 2
    ;;
  sleep)
    sleep 30
    ;;
  node)
    echo spawn >> .node-spawns
    echo "Started HTTP and WebSocket JSON-RPC server"
    exec sleep 60
    ;;
  *)
    echo "unknown task $1" >&2
    exit 1
    ;;
esac
"#;

pub struct FakeToolchain {
    pub dir: tempfile::TempDir,
    pub program: PathBuf,
}

#[cfg(unix)]
pub fn fake_toolchain() -> FakeToolchain {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let program = dir.path().join("fakehat");
    fs::write(&program, FAKE_SCRIPT).expect("write fake toolchain");
    let mut perm = fs::metadata(&program).expect("metadata").permissions();
    perm.set_mode(0o755);
    fs::set_permissions(&program, perm).expect("chmod");
    FakeToolchain { dir, program }
}

pub fn unused_endpoint() -> String {
    let l = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = l.local_addr().expect("addr").port();
    format!("http://127.0.0.1:{port}")
}

pub fn settings_for(program: &Path, endpoint: &str) -> Settings {
    let mut s = Settings::default();
    s.toolchain.program = program.display().to_string();
    s.toolchain.base_args = Vec::new();
    s.toolchain.init_args = vec!["init".to_string()];
    s.toolchain.installer_program = program.display().to_string();
    s.toolchain.installer_args = vec!["install-global".to_string()];
    s.network.rpc_url = endpoint.to_string();
    s.network.probe_mode = ProbeMode::Tcp;
    s.timeouts.probe = Duration::from_millis(500);
    s.timeouts.command = Duration::from_secs(20);
    s.timeouts.network_grace = Duration::from_secs(3);
    s.timeouts.stop = Duration::from_secs(3);
    s
}

/// YAML equivalent of `settings_for`, for driving the binary through `--config`.
pub fn settings_yaml(program: &Path, endpoint: &str) -> String {
    serde_yaml::to_string(&settings_for(program, endpoint)).expect("yaml")
}

pub fn spawn_count(project: &Path) -> usize {
    fs::read_to_string(project.join(".node-spawns"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    cond()
}
