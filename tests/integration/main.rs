//! Integration tests for Berth

use std::net::TcpListener;
use std::path::Path;
use tempfile::TempDir;

/// A project with a manifest, one module and an optional berth.toml
fn project(config: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("requirements.txt"),
        "uvicorn==0.22\nfastapi==0.95\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("app.py"), "app = FastAPI()\n").unwrap();
    if let Some(config) = config {
        std::fs::write(dir.path().join("berth.toml"), config).unwrap();
    }
    dir
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Loopback launch config without the bind probe
const LOOPBACK_NO_PROBE: &str = "[launch]\nhost = \"127.0.0.1\"\npreflight_bind = false\n";

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn berth() -> Command {
        cargo_bin_cmd!("berth")
    }

    /// Command with deployment state isolated under `state`
    fn berth_in(project: &Path, state: &Path) -> Command {
        let mut cmd = berth();
        cmd.env("XDG_STATE_HOME", state)
            .env("HOME", state)
            .arg("--project")
            .arg(project);
        cmd
    }

    #[test]
    fn help_displays() {
        berth()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("process launcher"));
    }

    #[test]
    fn version_displays() {
        berth()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("berth"));
    }

    #[test]
    fn plan_json_lists_layers() {
        let project = project(None);
        berth()
            .arg("--project")
            .arg(project.path())
            .args(["plan", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"image_tag\": \"berth-app:"))
            .stdout(predicate::str::contains("os-packages"))
            .stdout(predicate::str::contains("\"dependencies\": 2"));
    }

    #[test]
    fn plan_containerfile_installs_dependencies_before_source() {
        let project = project(None);
        let output = berth()
            .arg("--project")
            .arg(project.path())
            .args(["plan", "--containerfile"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let text = String::from_utf8(output.stdout).unwrap();
        let pip = text.find("pip install --no-cache-dir").unwrap();
        let source = text.find("COPY app/ ./").unwrap();
        assert!(pip < source);
        assert!(text.contains("rm -rf /var/lib/apt/lists/*"));
        assert!(text.contains("exec uvicorn app:app"));
    }

    #[test]
    fn plan_fails_without_manifest() {
        let dir = TempDir::new().unwrap();
        berth()
            .arg("--project")
            .arg(dir.path())
            .arg("plan")
            .assert()
            .failure()
            .stderr(predicate::str::contains("requirements.txt"));
    }

    #[test]
    fn plan_rejects_duplicate_dependencies() {
        let project = project(None);
        std::fs::write(
            project.path().join("requirements.txt"),
            "fastapi==0.95\nFastAPI==0.96\n",
        )
        .unwrap();
        berth()
            .arg("--project")
            .arg(project.path())
            .arg("plan")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Duplicate dependency"));
    }

    #[test]
    fn launch_dry_run_uses_port_env() {
        let project = project(Some(LOOPBACK_NO_PROBE));
        berth()
            .arg("--project")
            .arg(project.path())
            .env("PORT", "9090")
            .args(["launch", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("uvicorn app:app --host 127.0.0.1 --port 9090"));
    }

    #[test]
    fn launch_dry_run_defaults_to_8080() {
        let project = project(Some(LOOPBACK_NO_PROBE));
        berth()
            .arg("--project")
            .arg(project.path())
            .env_remove("PORT")
            .args(["launch", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--port 8080"));
    }

    #[test]
    fn launch_rejects_invalid_port() {
        let project = project(Some(LOOPBACK_NO_PROBE));
        berth()
            .arg("--project")
            .arg(project.path())
            .env("PORT", "eighty")
            .args(["launch", "--dry-run"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid PORT value: eighty"));
    }

    #[test]
    fn launch_fails_fast_on_occupied_port() {
        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let project = project(Some("[launch]\nhost = \"127.0.0.1\"\n"));

        berth()
            .arg("--project")
            .arg(project.path())
            .env("PORT", port.to_string())
            .arg("launch")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cannot bind"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let project = project(None);
        berth()
            .arg("--project")
            .arg(project.path())
            .args(["--config", "/nonexistent/berth.toml", "plan"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn init_writes_config() {
        let project = project(None);
        let state = TempDir::new().unwrap();
        berth_in(project.path(), state.path())
            .arg("init")
            .assert()
            .success();
        assert!(project.path().join("berth.toml").exists());

        berth_in(project.path(), state.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn config_path() {
        let project = project(None);
        berth()
            .arg("--project")
            .arg(project.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("berth.toml"));
    }

    #[test]
    fn config_show() {
        let project = project(Some("[launch]\nport = 9000\n"));
        berth()
            .arg("--project")
            .arg(project.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[launch]"))
            .stdout(predicate::str::contains("port = 9000"));
    }

    #[test]
    fn list_empty() {
        let project = project(None);
        let state = TempDir::new().unwrap();
        berth_in(project.path(), state.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No active deployments"));
    }

    #[test]
    fn stop_missing_deployment() {
        let project = project(None);
        let state = TempDir::new().unwrap();
        berth_in(project.path(), state.path())
            .args(["stop", "nonexistent"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Deployment not found"));
    }

    #[test]
    fn logs_missing_deployment() {
        let project = project(None);
        let state = TempDir::new().unwrap();
        berth_in(project.path(), state.path())
            .args(["logs", "nonexistent"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Deployment not found"));
    }
}

#[cfg(unix)]
mod exec_tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read};
    use std::os::unix::fs::PermissionsExt;
    use std::process::{Command, Stdio};

    /// Project whose "server" is a shell script
    fn project_with_server(script: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let server = dir.path().join("fake-server");
        std::fs::write(&server, script).unwrap();
        std::fs::set_permissions(&server, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = format!(
            "[launch]\nserver = {:?}\nhost = \"127.0.0.1\"\npreflight_bind = false\n",
            server.display().to_string()
        );
        std::fs::write(dir.path().join("berth.toml"), config).unwrap();
        dir
    }

    fn launch(project: &Path, port: u16) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_berth"));
        cmd.arg("--project")
            .arg(project)
            .arg("launch")
            .env("PORT", port.to_string())
            .env_remove("PYTHONUNBUFFERED")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    #[test]
    fn launcher_replaces_itself_with_server() {
        let project = project_with_server(
            "#!/bin/sh\necho \"pid=$$ port=$PORT unbuffered=$PYTHONUNBUFFERED args=$*\"\n",
        );
        let port = free_port();

        let child = launch(project.path(), port).spawn().unwrap();
        let launcher_pid = child.id();
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.contains(&format!("pid={}", launcher_pid)), "{stdout}");
        assert!(stdout.contains(&format!("port={}", port)), "{stdout}");
        assert!(stdout.contains("unbuffered=1"), "{stdout}");
        assert!(
            stdout.contains(&format!("args=app:app --host 127.0.0.1 --port {}", port)),
            "{stdout}"
        );
    }

    #[test]
    fn sigterm_reaches_server_directly() {
        let project = project_with_server(
            "#!/bin/sh\ntrap 'echo drained; exit 0' TERM\necho \"ready $$\"\nwhile :; do sleep 0.1; done\n",
        );

        let mut child = launch(project.path(), free_port()).spawn().unwrap();
        let launcher_pid = child.id();
        let mut stdout = BufReader::new(child.stdout.take().unwrap());

        let mut first = String::new();
        stdout.read_line(&mut first).unwrap();
        assert_eq!(first.trim(), format!("ready {}", launcher_pid));

        let rc = unsafe { libc::kill(launcher_pid as libc::pid_t, libc::SIGTERM) };
        assert_eq!(rc, 0);

        let status = child.wait().unwrap();
        assert!(status.success());

        let mut rest = String::new();
        stdout.read_to_string(&mut rest).unwrap();
        assert!(rest.contains("drained"));
    }

    #[test]
    fn missing_server_binary_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("berth.toml"),
            "[launch]\nserver = \"/nonexistent/uvicorn\"\nhost = \"127.0.0.1\"\npreflight_bind = false\n",
        )
        .unwrap();

        let output = launch(dir.path(), free_port()).output().unwrap();
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Failed to exec server"), "{stderr}");
    }
}
