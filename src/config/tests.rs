use super::AppConfig;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

static SCRIPT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Write a throwaway worker script so path validation has something real.
fn temp_script() -> PathBuf {
    let n = SCRIPT_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "voicebridge_test_worker_{}_{n}.py",
        std::process::id()
    ));
    fs::write(&path, "#!/usr/bin/env python3\n").expect("write test worker script");
    path
}

fn parse_with(args: &[&str]) -> AppConfig {
    let mut full = vec!["voicebridge"];
    full.extend_from_slice(args);
    AppConfig::parse_from(full)
}

#[test]
fn defaults_validate_with_an_existing_script() {
    let script = temp_script();
    let mut config = parse_with(&["--worker-script", script.to_str().unwrap()]);
    config.validate().expect("defaults should validate");
    assert_eq!(config.worker_cmd, "python3");
    assert_eq!(config.max_restarts, 5);
    assert_eq!(config.restart_base_delay_ms, 1000);
}

#[test]
fn missing_script_is_rejected() {
    let mut config = parse_with(&["--worker-script", "/no/such/recorder.py"]);
    let err = config.validate().expect_err("missing script must fail");
    assert!(
        format!("{err:#}").contains("--worker-script"),
        "error should name the flag, got {err:#}"
    );
}

#[test]
fn max_restarts_above_limit_is_rejected() {
    let script = temp_script();
    let mut config = parse_with(&[
        "--worker-script",
        script.to_str().unwrap(),
        "--max-restarts",
        "21",
    ]);
    assert!(config.validate().is_err());
}

#[test]
fn zero_max_restarts_is_allowed() {
    let script = temp_script();
    let mut config = parse_with(&[
        "--worker-script",
        script.to_str().unwrap(),
        "--max-restarts",
        "0",
    ]);
    config.validate().expect("restarts can be disabled");
}

#[test]
fn base_delay_out_of_range_is_rejected() {
    let script = temp_script();
    for delay in ["5", "60001"] {
        let mut config = parse_with(&[
            "--worker-script",
            script.to_str().unwrap(),
            "--restart-base-delay-ms",
            delay,
        ]);
        assert!(config.validate().is_err(), "delay {delay} should be rejected");
    }
}

#[test]
fn unknown_worker_cmd_is_rejected() {
    let script = temp_script();
    let mut config = parse_with(&[
        "--worker-script",
        script.to_str().unwrap(),
        "--worker-cmd",
        "definitely-not-python",
    ]);
    assert!(config.validate().is_err());
}

#[test]
fn worker_config_defaults_working_dir_to_script_parent() {
    let script = temp_script();
    let mut config = parse_with(&["--worker-script", script.to_str().unwrap()]);
    config.validate().expect("config should validate");

    let worker = config.worker_config();
    assert_eq!(worker.working_dir, config.worker_script.parent().unwrap());
    assert_eq!(worker.args[0], config.worker_script.to_string_lossy());
    assert!(worker.name.starts_with("voicebridge_test_worker"));
}

#[test]
fn worker_args_are_appended_after_the_script() {
    let script = temp_script();
    let mut config = parse_with(&[
        "--worker-script",
        script.to_str().unwrap(),
        "--worker-arg",
        "--device",
        "--worker-arg",
        "default",
    ]);
    config.validate().expect("config should validate");

    let worker = config.worker_config();
    assert_eq!(worker.args.len(), 3);
    assert_eq!(&worker.args[1..], &["--device", "default"]);
}
