use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn skiff_bin() -> PathBuf {
    PathBuf::from(assert_cmd::cargo::cargo_bin!("skiff"))
}

fn skiff_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(skiff_bin());
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("BASE_DIR")
        .env_remove("SKIFF_REGISTRY_DIR")
        .env_remove("SKIFF_TUNNEL_CONFIG");
    cmd
}

// ---------------------------------------------------------------------------
// Without a daemon
// ---------------------------------------------------------------------------

#[test]
fn help_lists_every_operation() {
    let home = TempDir::new().expect("home");
    let output = skiff_cmd(home.path()).arg("--help").output().expect("run --help");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    for sub in [
        "daemon", "init", "branches", "pull", "build", "env", "deploy", "publish", "projects",
    ] {
        assert!(stdout.contains(sub), "--help should mention `{sub}`:\n{stdout}");
    }
}

#[test]
fn client_command_without_daemon_fails_with_hint() {
    let home = TempDir::new().expect("home");
    skiff_cmd(home.path())
        .args(["deploy", "demo"])
        .assert()
        .failure()
        .stderr(contains("daemon is not running"))
        .stderr(contains("skiff daemon start"));
}

#[test]
fn daemon_status_without_daemon_reports_not_running() {
    let home = TempDir::new().expect("home");
    skiff_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
}

#[test]
fn daemon_stop_without_daemon_is_not_an_error() {
    let home = TempDir::new().expect("home");
    skiff_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn env_set_rejects_malformed_pairs() {
    let home = TempDir::new().expect("home");
    skiff_cmd(home.path())
        .args(["env", "set", "demo", "NOVALUE"])
        .assert()
        .failure()
        .stderr(contains("KEY=VALUE"));
}

#[test]
fn invalid_port_range_is_a_config_error() {
    let home = TempDir::new().expect("home");
    skiff_cmd(home.path())
        .env("SKIFF_PORT_MIN", "not-a-port")
        .args(["daemon", "start"])
        .assert()
        .failure()
        .stderr(contains("SKIFF_PORT_MIN"));
}

// ---------------------------------------------------------------------------
// Against a running daemon
// ---------------------------------------------------------------------------

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path) -> Self {
        let child = skiff_cmd(home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        let daemon = Self {
            child,
            home: home.to_path_buf(),
        };
        daemon.wait_until_running();
        daemon
    }

    fn wait_until_running(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            let output = skiff_cmd(&self.home)
                .args(["daemon", "status"])
                .output()
                .expect("daemon status");
            if String::from_utf8_lossy(&output.stdout).contains("\"running\": true") {
                return;
            }
            sleep(Duration::from_millis(100));
        }
        panic!("daemon did not come up");
    }

    fn stop(&mut self) {
        let _ = skiff_cmd(&self.home).args(["daemon", "stop"]).status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

#[test]
fn queries_round_trip_through_a_live_daemon() {
    let home = TempDir::new().expect("home");
    let _daemon = DaemonProcess::start(home.path());

    skiff_cmd(home.path())
        .args(["projects"])
        .assert()
        .success()
        .stdout(contains("No projects registered."));

    skiff_cmd(home.path())
        .args(["projects", "--json"])
        .assert()
        .success()
        .stdout(contains("[]"));

    skiff_cmd(home.path())
        .args(["branches", "ghost"])
        .assert()
        .success()
        .stdout("");

    skiff_cmd(home.path())
        .args(["deploy", "ghost"])
        .assert()
        .failure()
        .stderr(contains("project 'ghost' not found"))
        .stderr(contains("404"));

    skiff_cmd(home.path())
        .args(["publish", "ghost"])
        .assert()
        .failure()
        .stderr(contains("404"));

    skiff_cmd(home.path())
        .args(["init", "Bad Name", "https://x/y.git", "demo"])
        .assert()
        .failure()
        .stderr(contains("400"));
}

#[test]
fn second_daemon_refuses_to_start() {
    let home = TempDir::new().expect("home");
    let _daemon = DaemonProcess::start(home.path());

    skiff_cmd(home.path())
        .args(["daemon", "start"])
        .assert()
        .failure()
        .stderr(contains("already in use"));
}
