use std::path::Path;

use hardhat_panel::color::paint;
use hardhat_panel::config::Settings;
use hardhat_panel::probe::{probe_installation, probe_network, probe_project};
use hardhat_panel::toolchain::Toolchain;

fn yes_no(use_color: bool, ok: bool) -> String {
    if ok {
        paint(use_color, "\x1b[32;1m", "yes")
    } else {
        paint(use_color, "\x1b[31;1m", "no")
    }
}

/// Human-readable diagnostics on stderr; returns whether the toolchain is usable.
pub fn run_doctor(settings: &Settings, verbose: bool) -> bool {
    let use_color = hardhat_panel::color_enabled_stderr();
    eprintln!("hardhat-panel doctor");
    eprintln!();
    eprintln!("  version: v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "  host:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    if verbose {
        eprintln!("  build:   {}", env!("HARDHAT_PANEL_BUILD_DATE"));
        eprintln!("  target:  {}", env!("HARDHAT_PANEL_BUILD_TARGET"));
        eprintln!("  profile: {}", env!("HARDHAT_PANEL_BUILD_PROFILE"));
        eprintln!("  rustc:   {}", env!("HARDHAT_PANEL_BUILD_RUSTC"));
    }
    eprintln!();

    let toolchain = Toolchain::new(settings.toolchain.clone());
    match which::which(toolchain.program()) {
        Ok(p) => eprintln!("  launcher: {}", p.display()),
        Err(_) => eprintln!(
            "  launcher: {} ({})",
            toolchain.program(),
            paint(use_color, "\x1b[31;1m", "not found in PATH")
        ),
    }
    let install = probe_installation(&toolchain, settings.timeouts.version_query);
    eprintln!("  installed: {}", yes_no(use_color, install.installed));
    if let Some(v) = &install.version {
        eprintln!("  version reported: {v}");
    }

    let project = probe_project(&settings.project, Some(Path::new(".")));
    eprintln!("  project in current directory: {}", yes_no(use_color, project.detected));
    if let Some(cfg) = &project.config_file {
        eprintln!("  config file: {cfg}");
    }

    eprintln!("  rpc endpoint: {}", settings.network.rpc_url);
    match settings.network.endpoint() {
        Ok(url) => {
            let net = probe_network(&url, settings.network.probe_mode, settings.timeouts.probe);
            eprintln!("  network reachable: {}", yes_no(use_color, net.reachable));
        }
        Err(e) => eprintln!("  network reachable: invalid endpoint ({e})"),
    }

    if verbose {
        eprintln!();
        eprintln!("  effective settings:");
        match serde_yaml::to_string(settings) {
            Ok(yaml) => {
                for line in yaml.lines() {
                    eprintln!("    {line}");
                }
            }
            Err(e) => eprintln!("    (cannot render: {e})"),
        }
    }
    eprintln!();
    eprintln!("doctor: completed diagnostics.");
    install.installed
}
