use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn voicebridge_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_voicebridge").expect("voicebridge test binary not built")
}

fn temp_script(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "voicebridge_cli_worker_{}_{tag}.py",
        std::process::id()
    ));
    fs::write(&path, "#!/usr/bin/env python3\n").expect("write test worker script");
    path
}

#[test]
fn help_mentions_the_supervisor() {
    let output = Command::new(voicebridge_bin())
        .arg("--help")
        .output()
        .expect("run voicebridge --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("recorder supervisor"));
    assert!(combined.contains("--worker-script"));
}

#[test]
fn doctor_prints_the_resolved_worker_config() {
    let script = temp_script("doctor");
    let output = Command::new(voicebridge_bin())
        .arg("--doctor")
        .arg("--worker-script")
        .arg(&script)
        .output()
        .expect("run voicebridge --doctor");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("worker_cmd"));
    assert!(combined.contains("python3"));
    assert!(combined.contains("max_restarts"));
}

#[test]
fn missing_worker_script_fails_fast() {
    let output = Command::new(voicebridge_bin())
        .arg("--doctor")
        .arg("--worker-script")
        .arg("/no/such/recorder.py")
        .output()
        .expect("run voicebridge with bad script");
    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("--worker-script"),
        "error should name the flag, got: {combined}"
    );
}
