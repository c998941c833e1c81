//! End-to-end attempts against a fake engine and a mock HTTP proxy.

#![cfg(unix)]

use std::time::Duration;

use base64::Engine as _;
use ruleset_probe::discovery::BehaviorKind;
use ruleset_probe::harness::{AttemptRunner, Readiness};
use tokio_util::sync::CancellationToken;

mod common;

const LONG_RUNNING: &str = "echo engine-up\necho engine-warn >&2\nexec sleep 30";

#[tokio::test]
async fn test_success_through_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), LONG_RUNNING);
    let (port, requests) = common::mock_proxy_on_free_port(204).await;
    let harness = common::harness(&bin, dir.path(), Duration::from_secs(10), common::quick_poll());

    let artifact = common::artifact("/rules/geosite/google.mrs", BehaviorKind::Domain);
    let result = harness.run_one(&artifact, port).await;

    assert!(result.success, "log:\n{}", result.log);
    assert_eq!(result.port, port);
    assert!(result.log.contains("--- stdout ---\nengine-up\n"));
    assert!(result.log.contains("--- stderr ---\nengine-warn\n"));
    assert!(!common::process_alive(common::engine_pid(dir.path())));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "exactly one probe per attempt");
    assert!(requests[0].starts_with("GET http://probe.test/generate_204"));
}

#[tokio::test]
async fn test_http_failure_status_fails_and_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), LONG_RUNNING);
    let (port, _) = common::mock_proxy_on_free_port(502).await;
    let harness = common::harness(&bin, dir.path(), Duration::from_secs(10), common::quick_poll());

    let result = harness
        .run_one(&common::artifact("/rules/geoip/cn.mrs", BehaviorKind::IpCidr), port)
        .await;

    assert!(!result.success);
    assert!(result.log.starts_with("error: probe returned unexpected status 502"));
    assert!(result.log.contains("engine-up"));
    assert!(!common::process_alive(common::engine_pid(dir.path())));
}

#[tokio::test]
async fn test_network_failure_fails_and_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), LONG_RUNNING);
    let port = common::closed_port().await;
    let harness = common::harness(&bin, dir.path(), Duration::from_secs(10), common::quick_poll());

    let result = harness
        .run_one(&common::artifact("/rules/geosite/x.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(result.log.starts_with("error: probe request failed"));
    assert!(result.log.contains("engine-warn"));
    assert!(!common::process_alive(common::engine_pid(dir.path())));
}

#[tokio::test]
async fn test_silent_engine_still_yields_error_log() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), "exec sleep 30");
    let port = common::closed_port().await;
    let harness = common::harness(&bin, dir.path(), Duration::from_secs(10), common::quick_poll());

    let result = harness
        .run_one(&common::artifact("/rules/geosite/x.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(!result.log.is_empty());
    assert!(result.log.contains("probe request failed"));
    assert!(result.log.contains("--- stdout ---\n--- stderr ---\n"));
}

#[tokio::test]
async fn test_hard_cap_kills_stuck_engine() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), "echo stuck\nexec sleep 30");
    let port = common::closed_port().await;
    let harness = common::harness(
        &bin,
        dir.path(),
        Duration::from_millis(200),
        Readiness::Fixed(Duration::from_millis(600)),
    );

    let started = std::time::Instant::now();
    let result = harness
        .run_one(&common::artifact("/rules/geosite/x.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(result.log.contains("engine killed after hard cap"));
    assert!(result.log.contains("stuck"));
    assert!(!common::process_alive(common::engine_pid(dir.path())));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_crashing_engine_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), "echo 'parse config error' >&2\nexit 1");
    let port = common::closed_port().await;
    let harness = common::harness(&bin, dir.path(), Duration::from_secs(10), common::quick_poll());

    let result = harness
        .run_one(&common::artifact("/missing.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(result.log.contains("parse config error"));
}

#[tokio::test]
async fn test_spawn_failure_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::closed_port().await;
    let harness = common::harness(
        &dir.path().join("no-such-engine"),
        dir.path(),
        Duration::from_secs(10),
        common::quick_poll(),
    );

    let result = harness
        .run_one(&common::artifact("/rules/a.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(result.log.starts_with("error: failed to spawn engine"));
    assert!(result.log.contains("no-such-engine"));
}

#[tokio::test]
async fn test_engine_receives_synthesized_config() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), "echo \"$2\"\necho \"$SAFE_PATHS\" >&2\nexec sleep 30");
    let (port, _) = common::mock_proxy_on_free_port(200).await;
    let harness = common::harness(&bin, dir.path(), Duration::from_secs(10), common::quick_poll());

    let result = harness
        .run_one(&common::artifact("/rules/geoip/private.mrs", BehaviorKind::IpCidr), port)
        .await;
    assert!(result.success, "log:\n{}", result.log);

    let token = result
        .log
        .lines()
        .skip_while(|l| *l != "--- stdout ---")
        .nth(1)
        .unwrap();
    let raw = base64::engine::general_purpose::STANDARD.decode(token).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();

    assert_eq!(doc["mixed-port"], port);
    assert_eq!(doc["rule-providers"]["under-test"]["behavior"], "ipcidr");
    assert_eq!(doc["rule-providers"]["under-test"]["path"], "/rules/geoip/private.mrs");
    assert!(result.log.contains(&dir.path().display().to_string()));
}

#[tokio::test]
async fn test_teardown_reaches_processes_started_by_engine() {
    let dir = tempfile::tempdir().unwrap();
    let child_pid_file = dir.path().join("child.pid");
    let body = format!(
        "sleep 30 &\necho $! > '{}'\necho wrapper-up\nwait",
        child_pid_file.display()
    );
    let bin = common::fake_engine(dir.path(), &body);
    let port = common::closed_port().await;
    let harness = common::harness(
        &bin,
        dir.path(),
        Duration::from_secs(10),
        Readiness::Fixed(Duration::from_millis(200)),
    );

    let started = std::time::Instant::now();
    let result = harness
        .run_one(&common::artifact("/rules/geosite/x.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert!(result.log.contains("wrapper-up"));
    assert!(!result.log.contains("output still open"));
    assert!(!common::process_alive(common::engine_pid(dir.path())));
    let child = common::recorded_pid(dir.path(), "child.pid");
    assert!(common::gone_within(child, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_hard_cap_bounds_wrapped_engine() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), "echo up\nsleep 30");
    let port = common::closed_port().await;
    let harness = common::harness(
        &bin,
        dir.path(),
        Duration::from_millis(300),
        Readiness::Fixed(Duration::from_secs(1)),
    );

    let started = std::time::Instant::now();
    let result = harness
        .run_one(&common::artifact("/rules/geosite/x.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(!result.success);
    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    assert!(result.log.contains("engine killed after hard cap"));
    assert!(result.log.contains("up"));
}

#[tokio::test]
async fn test_chatty_engine_never_blocks_on_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(
        dir.path(),
        "yes stdout-filler-line | head -n 20000\nyes stderr-filler-line | head -n 20000 >&2\nexec sleep 30",
    );
    let (port, _) = common::mock_proxy_on_free_port(204).await;
    let harness = common::harness(
        &bin,
        dir.path(),
        Duration::from_secs(10),
        Readiness::Fixed(Duration::from_millis(1500)),
    );

    let result = harness
        .run_one(&common::artifact("/rules/geosite/big.mrs", BehaviorKind::Domain), port)
        .await;

    assert!(result.success, "log tail:\n{}", &result.log[result.log.len().saturating_sub(500)..]);
    assert!(result.log.len() > 2 * 64 * 1024);
    assert_eq!(result.log.lines().filter(|l| *l == "stdout-filler-line").count(), 20_000);
    assert_eq!(result.log.lines().filter(|l| *l == "stderr-filler-line").count(), 20_000);
    assert!(!common::process_alive(common::engine_pid(dir.path())));
}

#[tokio::test]
async fn test_interrupt_while_warming_stops_engine() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_engine(dir.path(), LONG_RUNNING);
    let port = common::closed_port().await;
    let shutdown = CancellationToken::new();
    let harness = common::harness(
        &bin,
        dir.path(),
        Duration::from_secs(10),
        Readiness::Fixed(Duration::from_secs(5)),
    )
    .with_shutdown(shutdown.clone());

    let artifact = common::artifact("/rules/geoip/cn.mrs", BehaviorKind::IpCidr);
    let interrupt = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
    };

    let started = std::time::Instant::now();
    let (result, ()) = tokio::join!(harness.run_one(&artifact, port), interrupt);

    assert!(!result.success);
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert!(result.log.contains("note: run interrupted before probe"));
    assert!(result.log.contains("engine-up"));
    assert!(!common::process_alive(common::engine_pid(dir.path())));
}
