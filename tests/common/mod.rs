//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ruleset_probe::discovery::{Artifact, BehaviorKind};
use ruleset_probe::engine::EngineLauncher;
use ruleset_probe::harness::{Harness, Probe, Readiness};

pub const PROBE_URL: &str = "http://probe.test/generate_204";

/// Request lines received by a mock proxy.
pub type RequestLog = Arc<Mutex<Vec<String>>>;

/// Start a mock HTTP proxy on `listener` that answers every request with `status`.
pub fn start_mock_proxy(listener: TcpListener, status: u16) -> RequestLog {
    let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let log = log.clone();
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }
                        let head = String::from_utf8_lossy(&buf);
                        if let Some(line) = head.lines().next() {
                            log.lock().unwrap().push(line.to_string());
                        }

                        let reason = match status {
                            200 => "OK",
                            204 => "No Content",
                            403 => "Forbidden",
                            502 => "Bad Gateway",
                            _ => "Unknown",
                        };
                        let response = format!(
                            "HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    requests
}

/// Bind a mock proxy on a fresh loopback port and return the port.
pub async fn mock_proxy_on_free_port(status: u16) -> (u16, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (port, start_mock_proxy(listener, status))
}

/// Bind a mock proxy on a specific address.
pub async fn mock_proxy_on(addr: SocketAddr, status: u16) -> RequestLog {
    let listener = TcpListener::bind(addr).await.unwrap();
    start_mock_proxy(listener, status)
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Write an executable shell script standing in for the engine.
///
/// The script records its PID in `engine.pid` next to itself before running `body`.
#[cfg(unix)]
pub fn fake_engine(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-engine.sh");
    let pid_file = dir.join("engine.pid");
    let script = format!("#!/bin/sh\necho $$ > '{}'\n{body}\n", pid_file.display());
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// PID recorded by the fake engine in `dir`.
pub fn engine_pid(dir: &Path) -> u32 {
    recorded_pid(dir, "engine.pid")
}

/// PID the fake engine in `dir` wrote to `name`.
pub fn recorded_pid(dir: &Path, name: &str) -> u32 {
    std::fs::read_to_string(dir.join(name))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

/// True if a process with `pid` still runs. Unreaped zombies count as gone.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        let state = stat.rsplit(')').next().unwrap_or_default().trim_start();
        return !state.starts_with('Z');
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Wait up to `within` for `pid` to disappear.
#[cfg(unix)]
pub async fn gone_within(pid: u32, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while process_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

pub fn harness(binary: &Path, work_dir: &Path, hard_cap: Duration, readiness: Readiness) -> Harness {
    Harness::new(
        EngineLauncher::new(binary, work_dir, hard_cap, "SAFE_PATHS"),
        readiness,
        Probe::new(PROBE_URL, vec![200, 204], Duration::from_secs(2)),
    )
}

pub fn quick_poll() -> Readiness {
    Readiness::Poll {
        timeout: Duration::from_millis(300),
        base_delay_ms: 10,
        max_delay_ms: 50,
    }
}

pub fn artifact(path: &str, behavior: BehaviorKind) -> Artifact {
    Artifact::new(PathBuf::from(path), behavior)
}
