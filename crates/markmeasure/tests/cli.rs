mod common;

use assert_cmd::Command;
use common::{paper, paste_marker, save_png};
use predicates::prelude::*;
use serde_json::json;

fn markmeasure() -> Command {
    Command::cargo_bin("markmeasure").expect("binary")
}

#[test]
fn marker_then_detect_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let png = dir.path().join("marker_12.png");

    markmeasure()
        .args(["marker", "--id", "12", "--cell-px", "20", "--quiet-px", "40", "--out"])
        .arg(&png)
        .assert()
        .success()
        .stdout(predicate::str::contains("200x200"));

    markmeasure()
        .arg("detect")
        .arg(&png)
        .args(["--marker-mm", "60"])
        .assert()
        .success()
        .stdout(predicate::str::contains("markers: 1"))
        .stdout(predicate::str::contains("id 12"))
        .stdout(predicate::str::contains("px/mm: 2.000"));
}

#[test]
fn detect_json_lists_markers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let png = dir.path().join("scene.png");
    let mut img = paper(300, 200);
    paste_marker(&mut img, 3, 10, 30, 30);
    paste_marker(&mut img, 44, 10, 200, 100);
    save_png(&img, &png);

    let out = markmeasure()
        .arg("detect")
        .arg(&png)
        .arg("--json")
        .output()
        .expect("run");
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    let mut ids: Vec<u64> = report["markers"]
        .as_array()
        .expect("markers")
        .iter()
        .map(|m| m["id"].as_u64().expect("id"))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![3, 44]);
    assert!(report["px_per_mm"].as_f64().is_some());
}

#[test]
fn rectify_without_markers_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let png = dir.path().join("blank.png");
    save_png(&paper(80, 80), &png);

    markmeasure()
        .arg("rectify")
        .arg(&png)
        .arg("--out")
        .arg(dir.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("four markers"));
}

#[test]
fn run_prints_a_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let png = dir.path().join("one.png");
    let mut img = paper(300, 300);
    paste_marker(&mut img, 0, 20, 60, 60);
    save_png(&img, &png);

    let script = dir.path().join("script.json");
    std::fs::write(
        &script,
        json!({
            "image_path": png.display().to_string(),
            "actions": [
                { "op": "detect_scale" },
                { "op": "line", "x1": 0, "y1": 100, "x2": 0, "y2": 400 }
            ]
        })
        .to_string(),
    )
    .expect("write script");

    markmeasure()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"scaled\""))
        .stdout(predicate::str::contains("150.0 mm"));
    assert!(dir.path().join("one.png.annotations.json").exists());
}

#[test]
fn unknown_marker_id_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    markmeasure()
        .args(["marker", "--id", "50", "--out"])
        .arg(dir.path().join("x.png"))
        .assert()
        .failure();
}
