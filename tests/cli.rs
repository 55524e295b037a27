//! End-to-end tests driving the built `geomean` binary

use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

fn geomean(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_geomean"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run geomean")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_usage_error(output: &Output) {
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(output));
    assert!(stderr(output).contains("Usage:"), "stderr: {}", stderr(output));
    assert!(!stdout(output).contains("Geometric mean"));
}

/// Wait for `child` to exit, killing it after `limit`
fn wait_with_timeout(mut child: Child, limit: Duration) -> Output {
    let deadline = Instant::now() + limit;
    while child.try_wait().unwrap().is_none() {
        if Instant::now() >= deadline {
            child.kill().unwrap();
            panic!("geomean did not exit within {:?}", limit);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    child.wait_with_output().unwrap()
}

fn field(text: &str, label: &str) -> f64 {
    text.lines()
        .find_map(|line| line.strip_prefix(label))
        .unwrap_or_else(|| panic!("missing {:?} in {:?}", label, text))
        .trim()
        .parse()
        .unwrap()
}

#[test]
fn test_missing_size_is_usage_error() {
    assert_usage_error(&geomean(&["-w", "2"]));
}

#[test]
fn test_two_sizes_is_usage_error() {
    assert_usage_error(&geomean(&["4", "5"]));
}

#[test]
fn test_size_out_of_range_is_usage_error() {
    assert_usage_error(&geomean(&["0"]));
    assert_usage_error(&geomean(&["9"]));
}

#[test]
fn test_size_smaller_than_group_is_usage_error() {
    let output = geomean(&["-w", "4", "3"]);
    assert_usage_error(&output);
    assert!(stderr(&output).contains("smaller than the number of workers"));
}

#[test]
fn test_eight_values_four_workers() {
    let output = geomean(&["--workers", "4", "--seed", "1", "8"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let product = field(&text, "Sum:");
    let mean = field(&text, "Geometric mean:");
    assert_eq!(field(&text, "Vector Size:"), 8.0);
    assert!(text.contains("Processing time:"));
    assert!(product >= 0.0);
    assert!(mean >= 0.0 && mean <= 2_147_483_647.0);
}

#[test]
fn test_verbose_prints_every_index_once() {
    let output = geomean(&["-w", "2", "-v", "--no-timing", "--max-value", "9", "5"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    for index in 0..5 {
        let prefix = format!("vector[{}] = ", index);
        assert_eq!(text.lines().filter(|l| l.starts_with(&prefix)).count(), 1, "{}", text);
    }
    assert!(!text.contains("Processing time"));
}

#[test]
fn test_seeded_runs_agree() {
    let args = ["-w", "2", "--seed", "42", "--max-value", "100", "--no-timing", "6"];
    let first = geomean(&args);
    let second = geomean(&args);

    assert!(first.status.success());
    assert_eq!(stdout(&first), stdout(&second));
}

#[test]
fn test_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    let output = geomean(&["-w", "2", "--json-output", path.to_str().unwrap(), "5"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["report"]["size"], 5);
    assert_eq!(value["report"]["workers"], 2);
}

#[test]
fn test_config_file_supplies_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geomean.toml");
    std::fs::write(&path, "[run]\nsize = 4\n\n[group]\nworkers = 2\n").unwrap();

    let output = geomean(&["-c", path.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(field(&stdout(&output), "Vector Size:"), 4.0);
}

#[test]
fn test_missing_config_file_fails() {
    let output = geomean(&["-c", "/nonexistent/geomean.toml", "4"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read config file"));
}

#[test]
fn test_coordinator_and_worker_processes() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let addr = format!("127.0.0.1:{}", port);

    let coordinator = Command::new(env!("CARGO_BIN_EXE_geomean"))
        .args(["--mode", "coordinator", "--listen", &addr, "-w", "2", "--seed", "3", "4"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let worker = geomean(&["--mode", "worker", "--connect", &addr, "--seed", "3"]);
    let coordinator = coordinator.wait_with_output().unwrap();

    assert!(worker.status.success(), "worker stderr: {}", stderr(&worker));
    assert!(coordinator.status.success(), "coordinator stderr: {}", stderr(&coordinator));
    assert_eq!(field(&stdout(&coordinator), "Vector Size:"), 4.0);
    assert!(stdout(&worker).is_empty());
}

#[test]
fn test_worker_gives_up_when_coordinator_rejects_request() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let addr = format!("127.0.0.1:{}", port);

    let coordinator = geomean(&["--mode", "coordinator", "--listen", &addr, "-w", "2", "9"]);
    assert_usage_error(&coordinator);

    let worker = geomean(&["--mode", "worker", "--connect", &addr, "--connect-retries", "2"]);
    assert_eq!(worker.status.code(), Some(1));
    assert!(stderr(&worker).contains("Failed to connect to coordinator"));
}

#[test]
fn test_coordinator_rejects_bad_size_before_workers_join() {
    for args in [&["-w", "2", "9"][..], &["-w", "3"][..]] {
        let child = Command::new(env!("CARGO_BIN_EXE_geomean"))
            .args(["--mode", "coordinator", "--listen", "127.0.0.1:0"])
            .args(args)
            .env_remove("RUST_LOG")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let output = wait_with_timeout(child, Duration::from_secs(10));
        assert_usage_error(&output);
    }
}
