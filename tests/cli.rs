mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

use common::{vowel_samples, write_wav, REFERENCE_F0, SAMPLE_RATE};

fn phonalyzer() -> Command {
    Command::cargo_bin("phonalyzer").expect("binary built")
}

#[test]
fn compare_prints_json_contract() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("reference.wav");
    let attempt = dir.path().join("attempt.wav");
    let samples = vowel_samples(REFERENCE_F0, 16_000, SAMPLE_RATE);
    write_wav(&reference, &samples, SAMPLE_RATE);
    write_wav(&attempt, &samples, SAMPLE_RATE);

    let output = phonalyzer()
        .args(["compare", "--reference"])
        .arg(&reference)
        .arg("--attempt")
        .arg(&attempt)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let overall = value["overall_score"].as_f64().unwrap();
    assert!((overall - 100.0).abs() < 1e-9, "overall {overall}");
    assert_eq!(value["sub_scores"]["formant"].as_f64(), Some(100.0));
    assert_eq!(value["feedback"], serde_json::json!([]));
    assert_eq!(value["strengths"].as_array().map(Vec::len), Some(5));
    assert_eq!(value["band"], "excellent");
}

#[test]
fn compare_by_word_renders_text() {
    let dir = tempdir().unwrap();
    let references = dir.path().join("refs");
    std::fs::create_dir(&references).unwrap();
    write_wav(
        &references.join("bonjour.wav"),
        &vowel_samples(REFERENCE_F0, 16_000, SAMPLE_RATE),
        SAMPLE_RATE,
    );
    let attempt = dir.path().join("attempt.wav");
    write_wav(&attempt, &vowel_samples(REFERENCE_F0, 11_200, SAMPLE_RATE), SAMPLE_RATE);

    phonalyzer()
        .args(["compare", "--word", "Bonjour", "--reference-dir"])
        .arg(&references)
        .arg("--attempt")
        .arg(&attempt)
        .args(["--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Overall score:"))
        .stdout(predicate::str::contains("+ Excellent vowel pronunciation"))
        .stdout(predicate::str::contains("Speaking too fast"));
}

#[test]
fn unknown_word_fails_with_missing_reference() {
    let dir = tempdir().unwrap();
    let attempt = dir.path().join("attempt.wav");
    write_wav(&attempt, &vowel_samples(REFERENCE_F0, 8_000, SAMPLE_RATE), SAMPLE_RATE);

    phonalyzer()
        .args(["compare", "--word", "absent", "--reference-dir"])
        .arg(dir.path())
        .arg("--attempt")
        .arg(&attempt)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing_reference"));
}

#[test]
fn silent_attempt_reports_error_kind() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("reference.wav");
    let attempt = dir.path().join("attempt.wav");
    write_wav(&reference, &vowel_samples(REFERENCE_F0, 16_000, SAMPLE_RATE), SAMPLE_RATE);
    write_wav(&attempt, &vec![0.0; 16_000], SAMPLE_RATE);

    phonalyzer()
        .args(["compare", "--reference"])
        .arg(&reference)
        .arg("--attempt")
        .arg(&attempt)
        .assert()
        .failure()
        .stderr(predicate::str::contains("silent_audio"));
}

#[test]
fn trend_reads_history_file() {
    let dir = tempdir().unwrap();
    let history = dir.path().join("history.json");
    let record = |index: u32, overall: f64, formant: f64| {
        serde_json::json!({
            "index": index,
            "timestamp": format!("2024-03-10T09:0{index}:00Z"),
            "result": {
                "overall_score": overall,
                "sub_scores": {
                    "pitch": overall, "formant": formant, "intensity": overall,
                    "duration": overall, "voice_quality": overall
                },
                "feedback": []
            }
        })
    };
    let records = serde_json::json!([
        record(1, 70.0, 70.0),
        record(2, 74.0, 74.0),
        record(3, 68.0, 50.0)
    ]);
    std::fs::write(&history, records.to_string()).unwrap();

    let output = phonalyzer()
        .arg("trend")
        .arg("--history")
        .arg(&history)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["direction"], "declined");
    assert_eq!(report["primary_regression"], "formant");
    assert_eq!(report["transitions"][0]["direction"], "improved");
    assert_eq!(report["message"], "Your score dropped by 6.0 points");
    let reasons = report["decline_reasons"].as_array().unwrap();
    assert_eq!(reasons.len(), 5);
    assert_eq!(reasons[1], "Your vowel pronunciation changed from the previous attempt");
}

#[test]
fn trend_rejects_short_history() {
    let dir = tempdir().unwrap();
    let history = dir.path().join("history.json");
    std::fs::write(&history, "[]").unwrap();
    phonalyzer()
        .args(["trend", "--history"])
        .arg(&history)
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient_history"));
}

#[test]
fn reference_and_word_are_mutually_exclusive() {
    phonalyzer()
        .args([
            "compare", "--reference", "a.wav", "--word", "cat", "--reference-dir", "refs",
            "--attempt", "b.wav",
        ])
        .assert()
        .failure();
}
