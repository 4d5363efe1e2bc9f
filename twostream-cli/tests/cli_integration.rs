use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// Helper function to get the path to the compiled binary
fn twostream_cmd() -> Command {
    Command::cargo_bin("twostream").expect("Failed to find twostream binary")
}

struct Split {
    frame_counts: PathBuf,
    manifest: PathBuf,
}

/// Three videos, two classes, explicit 1-based labels (all class 1).
fn write_split(dir: &Path) -> Result<Split, Box<dyn Error>> {
    let frame_counts = dir.join("frame_count.json");
    fs::write(
        &frame_counts,
        r#"{"v_A_g01_c01.avi": 40, "v_B_g01_c01.avi": 29, "v_C_g01_c01.avi": 60}"#,
    )?;
    let manifest = dir.join("testlist.txt");
    fs::write(
        &manifest,
        "X/v_A_g01_c01.avi 1\nX/v_B_g01_c01.avi 1\nX/v_C_g01_c01.avi 1\n",
    )?;
    Ok(Split { frame_counts, manifest })
}

fn split_args(cmd: &mut Command, split: &Split) {
    cmd.arg("--frame-counts")
        .arg(&split.frame_counts)
        .arg("--split")
        .arg(&split.manifest);
}

#[test]
fn test_index_reports_key_counts() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let output = dir.path().join("eval_keys.json");

    let mut cmd = twostream_cmd();
    cmd.arg("index");
    split_args(&mut cmd, &split);
    cmd.arg("--output").arg(&output);

    cmd.assert()
        .success()
        .stdout(contains("Training keys:    3"))
        .stdout(contains("Evaluation clips: 57"));

    let keys: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    let keys = keys.as_array().unwrap();
    assert_eq!(keys.len(), 57);
    assert_eq!(keys[0]["video_id"], "A_g01_c01");
    assert_eq!(keys[0]["start_offset"], 1);
    assert_eq!(keys[0]["label"], 0);
    Ok(())
}

#[test]
fn test_index_rejects_window_longer_than_video() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;

    let mut cmd = twostream_cmd();
    cmd.arg("index");
    split_args(&mut cmd, &split);
    cmd.arg("--window").arg("35");

    cmd.assert()
        .failure()
        .stderr(contains("B_g01_c01"));
    Ok(())
}

#[test]
fn test_aggregate_reports_video_accuracy() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let scores = dir.path().join("scores.jsonl");
    // A sums to [5,1], B to [1,5], C to [2,2]; every label is class 0.
    fs::write(
        &scores,
        concat!(
            "{\"video_id\": \"A_g01_c01\", \"scores\": [3, 1]}\n",
            "{\"video_id\": \"B_g01_c01\", \"scores\": [1, 5]}\n",
            "\n",
            "{\"video_id\": \"A_g01_c01\", \"scores\": [2, 0]}\n",
            "{\"video_id\": \"C_g01_c01\", \"views\": [[1, 2], [1, 0]]}\n",
        ),
    )?;
    let export = dir.path().join("videos.json");
    let record = dir.path().join("record.jsonl");

    let mut cmd = twostream_cmd();
    cmd.arg("aggregate").arg("--scores").arg(&scores);
    split_args(&mut cmd, &split);
    cmd.arg("--num-classes").arg("2");
    cmd.arg("--top-k")
        .arg("2")
        .arg("--export")
        .arg(&export)
        .arg("--record")
        .arg(&record);

    cmd.assert()
        .success()
        .stdout(contains("66.67"))
        .stdout(contains("100.00"));

    let exported: serde_json::Value = serde_json::from_str(&fs::read_to_string(&export)?)?;
    assert_eq!(exported["videos"]["A_g01_c01"]["clips"], 2);

    let line = fs::read_to_string(&record)?;
    assert!(line.contains("\"phase\":\"test\""));
    Ok(())
}

#[test]
fn test_aggregate_rejects_unknown_video() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let scores = dir.path().join("scores.jsonl");
    fs::write(&scores, "{\"video_id\": \"Z_g09_c09\", \"scores\": [1, 0]}\n")?;

    let mut cmd = twostream_cmd();
    cmd.arg("aggregate").arg("--scores").arg(&scores);
    split_args(&mut cmd, &split);
    cmd.arg("--num-classes").arg("2");

    cmd.assert().failure().stderr(contains("Z_g09_c09"));
    Ok(())
}

#[test]
fn test_aggregate_reports_malformed_score_line() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let scores = dir.path().join("scores.jsonl");
    fs::write(&scores, "{\"video_id\": \"A_g01_c01\", \"scores\": [1, 0]}\nnot json\n")?;

    let mut cmd = twostream_cmd();
    cmd.arg("aggregate").arg("--scores").arg(&scores);
    split_args(&mut cmd, &split);
    cmd.arg("--num-classes").arg("2");

    cmd.assert()
        .failure()
        .stderr(contains("Invalid score line 2"));
    Ok(())
}

#[test]
fn test_aggregate_rejects_scores_of_wrong_length() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let scores = dir.path().join("scores.jsonl");
    fs::write(
        &scores,
        "{\"video_id\": \"A_g01_c01\", \"scores\": [1, 0]}\n{\"video_id\": \"B_g01_c01\", \"scores\": [1, 0, 0]}\n",
    )?;

    let mut cmd = twostream_cmd();
    cmd.arg("aggregate").arg("--scores").arg(&scores);
    split_args(&mut cmd, &split);
    cmd.arg("--num-classes").arg("2");

    cmd.assert()
        .failure()
        .stderr(contains("Invalid score line 2").and(contains("expected 2")));
    Ok(())
}

#[test]
fn test_verify_reports_missing_frames_from_env_root() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let frames = tempdir()?;

    let mut cmd = twostream_cmd();
    cmd.arg("verify").env("TWOSTREAM_FRAME_ROOT", frames.path());
    split_args(&mut cmd, &split);
    cmd.arg("--workers").arg("2");

    cmd.assert()
        .failure()
        .stderr(contains("Missing frame").and(contains("Frame verification failed")));
    Ok(())
}

#[test]
fn test_log_dir_receives_run_log() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;
    let logs = dir.path().join("logs");

    let mut cmd = twostream_cmd();
    cmd.arg("index").arg("--log-dir").arg(&logs);
    split_args(&mut cmd, &split);
    cmd.assert().success();

    let names: Vec<String> = fs::read_dir(&logs)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("twostream_index_"));
    assert!(fs::read_to_string(logs.join(&names[0]))?.contains("Loaded 3 videos"));
    Ok(())
}

#[test]
fn test_invalid_modality_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let split = write_split(dir.path())?;

    let mut cmd = twostream_cmd();
    cmd.arg("index");
    split_args(&mut cmd, &split);
    cmd.arg("--modality").arg("audio");

    cmd.assert().failure().stderr(contains("unknown modality"));
    Ok(())
}
