//! Binary-level tests. Each test gets its own HOME, config root and model
//! file, and a shell script standing in for the nginx binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const FAKE_NGINX: &str = r#"#!/bin/sh
cat >&2 <<'EOF'
nginx version: nginx/1.25.3
built with OpenSSL 3.0.2 15 Mar 2022
TLS SNI support enabled
configure arguments: --prefix=/etc/nginx --with-stream --with-http_ssl_module
EOF
"#;

const MODEL: &str = r#"
hosts:
  - id: web
    domain_names: [example.com]
    bindings:
      - { type: http, ip: 0.0.0.0, port: 80 }
    routes:
      - { id: api, priority: 1, type: proxy, source_path: /, target_uri: "http://127.0.0.1:9000" }
"#;

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            home: TempDir::new().expect("home"),
        };
        let script = env.path().join("nginx");
        fs::write(&script, FAKE_NGINX).expect("write fake nginx");
        make_executable(&script);
        env
    }

    fn with_model(yaml: &str) -> Self {
        let env = Self::new();
        fs::write(env.path().join("model.yaml"), yaml).expect("write model");
        env
    }

    fn path(&self) -> &Path {
        self.home.path()
    }

    fn config_root(&self) -> PathBuf {
        self.path().join("nginx-root")
    }

    fn ignis(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ignis"));
        cmd.env("HOME", self.path())
            .env("NO_COLOR", "1")
            .env("IGNIS_NGINX_BINARY", self.path().join("nginx"))
            .env("IGNIS_CONFIG_ROOT", self.config_root())
            .env("IGNIS_MODEL_PATH", self.path().join("model.yaml"))
            .env_remove("RUST_LOG");
        cmd
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

// ---------------------------------------------------------------------------
// detect
// ---------------------------------------------------------------------------

#[test]
fn detect_reports_features_as_json() {
    let env = Env::new();
    env.ignis()
        .args(["detect", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""version": "1.25.3""#))
        .stdout(contains(r#""stream_type": "static""#))
        .stdout(contains(r#""tls_sni": "static""#))
        .stdout(contains(r#""run_code_type": "none""#));
}

#[test]
fn detect_fails_for_missing_binary() {
    let env = Env::new();
    env.ignis()
        .env("IGNIS_NGINX_BINARY", env.path().join("no-such-nginx"))
        .arg("detect")
        .assert()
        .failure()
        .stderr(contains("failed to probe"));
}

// ---------------------------------------------------------------------------
// render / apply / diff
// ---------------------------------------------------------------------------

#[test]
fn render_lists_files_without_writing() {
    let env = Env::with_model(MODEL);
    env.ignis()
        .arg("render")
        .assert()
        .success()
        .stdout(contains("host-web.conf"))
        .stdout(contains("nginx.conf"))
        .stdout(contains("mime.types"))
        .stdout(contains("3 files for 1 hosts and 0 streams (nothing written)"));
    assert!(!env.config_root().join("config").exists());
}

#[test]
fn render_prints_a_single_file() {
    let env = Env::with_model(MODEL);
    env.ignis()
        .args(["render", "--file", "host-web.conf"])
        .assert()
        .success()
        .stdout(contains("server_name example.com;"))
        .stdout(contains("http://127.0.0.1:9000"));

    env.ignis()
        .args(["render", "--file", "host-nope.conf"])
        .assert()
        .failure()
        .stderr(contains("no generated file named 'host-nope.conf'"));
}

#[test]
fn apply_writes_the_tree_and_diff_is_clean_afterwards() {
    let env = Env::with_model(MODEL);
    env.ignis()
        .arg("apply")
        .assert()
        .success()
        .stdout(contains("wrote 3 files"));

    let config = env.config_root().join("config");
    assert!(config.join("host-web.conf").is_file());
    assert!(config.join("nginx.conf").is_file());
    assert!(env.config_root().join("logs").is_dir());

    env.ignis()
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("No differences."));
}

#[test]
fn apply_reload_without_daemon_writes_then_fails() {
    let env = Env::with_model(MODEL);
    env.ignis()
        .args(["apply", "--reload"])
        .assert()
        .failure()
        .stdout(contains("wrote 3 files"))
        .stderr(contains("the daemon is not running"));
    assert!(env.config_root().join("config").join("nginx.conf").is_file());
}

#[test]
fn diff_shows_model_changes() {
    let env = Env::with_model(MODEL);
    env.ignis().arg("apply").assert().success();

    let changed = MODEL.replace("example.com", "example.org");
    fs::write(env.path().join("model.yaml"), changed).expect("rewrite model");

    env.ignis()
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("--- a/host-web.conf"))
        .stdout(contains("-    server_name example.com;"))
        .stdout(contains("+    server_name example.org;"));

    env.ignis()
        .args(["diff", "--stat"])
        .assert()
        .success()
        .stdout(contains("M host-web.conf"))
        .stdout(contains("0 added, 1 changed, 0 removed"));
}

#[test]
fn unsupported_stream_fails_render() {
    let env = Env::new();
    fs::write(
        env.path().join("nginx"),
        FAKE_NGINX.replace(" --with-stream", ""),
    )
    .expect("rewrite fake nginx");
    fs::write(
        env.path().join("model.yaml"),
        r#"
streams:
  - id: pg
    type: simple
    binding: { protocol: tcp, address: 0.0.0.0, port: 5432 }
    default_backend: { address: 10.0.0.9, port: 5432 }
"#,
    )
    .expect("write model");

    env.ignis().arg("apply").assert().failure();
    assert!(!env.config_root().join("config").exists());
}

// ---------------------------------------------------------------------------
// logs
// ---------------------------------------------------------------------------

#[test]
fn logs_tail_prints_the_last_lines_oldest_first() {
    let env = Env::new();
    let logs = env.config_root().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(logs.join("main.log"), "one\ntwo\nthree\nfour\n").unwrap();

    env.ignis()
        .args(["logs", "tail", "--lines", "2"])
        .assert()
        .success()
        .stdout("three\nfour\n");
}

#[test]
fn logs_search_reads_host_logs_with_context() {
    let env = Env::new();
    let logs = env.config_root().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(
        logs.join("host-web.error.log"),
        "boot\nupstream timed out\nretry\nidle\nidle\n",
    )
    .unwrap();

    env.ignis()
        .args([
            "logs", "search", "UPSTREAM out", "--host", "web", "--error", "--window", "1",
        ])
        .assert()
        .success()
        .stdout("boot\nupstream timed out\nretry\n");
}

#[test]
fn logs_error_flag_requires_host() {
    let env = Env::new();
    env.ignis()
        .args(["logs", "tail", "--error"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// server / daemon without a running daemon
// ---------------------------------------------------------------------------

#[test]
fn server_status_without_daemon_reports_not_running() {
    let env = Env::new();
    env.ignis()
        .args(["server", "status"])
        .assert()
        .success()
        .stdout(contains(r#""running": false"#))
        .stdout(contains("ignis.sock"));
}

#[test]
fn server_reload_without_daemon_fails() {
    let env = Env::new();
    env.ignis()
        .args(["server", "reload"])
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));
}

#[test]
fn daemon_stop_without_daemon_is_not_an_error() {
    let env = Env::new();
    env.ignis()
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running").and(contains("requested").not()));
}
