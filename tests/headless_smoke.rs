use std::process::Command;

fn grainflow() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_grainflow"));
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn headless_run_prints_summary() {
    let output = grainflow()
        .args(["--headless", "120", "--width", "60", "--height", "45", "--seed", "7"])
        .output()
        .expect("failed to run grainflow binary");
    assert!(output.status.success(), "headless run failed: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("seed=7 iteration=120 "), "unexpected summary: {stdout}");
    assert!(stdout.contains(" sand="));
}

#[test]
fn headless_is_deterministic_for_seed() {
    let run = || {
        grainflow()
            .args(["--headless", "90", "--width", "40", "--height", "30", "--seed", "3", "--slopes", "2"])
            .output()
            .expect("failed to run grainflow binary")
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn headless_rejects_bad_fill_ratio() {
    let output = grainflow()
        .args(["--headless", "1", "--width", "20", "--height", "15", "--fill", "1.5"])
        .output()
        .expect("failed to run grainflow binary");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fill ratio"), "unexpected error: {stderr}");
}
