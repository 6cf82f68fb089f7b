//! Runs the butterfly-route binary on small CSV graphs

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn write_ladder(dir: &Path) {
    // two rails 0-1-2-3 and 4-5-6-7 joined by rungs
    let mut nodes = String::from("id,lat,lon\n");
    for i in 0..8 {
        nodes.push_str(&format!("{},{},{}\n", i, 50.0 + (i / 4) as f32 * 0.01, 4.0 + (i % 4) as f32 * 0.01));
    }
    let mut edges = String::from("from,to,weight,forward,backward\n");
    for rail in [0, 4] {
        for i in 0..3 {
            edges.push_str(&format!("{},{},2,true,true\n", rail + i, rail + i + 1));
        }
    }
    for i in 0..4 {
        edges.push_str(&format!("{},{},5,true,true\n", i, i + 4));
    }
    fs::write(dir.join("nodes.csv"), nodes).unwrap();
    fs::write(dir.join("edges.csv"), edges).unwrap();
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_butterfly-route"))
        .args(args)
        .arg("--nodes")
        .arg(dir.join("nodes.csv"))
        .arg("--edges")
        .arg(dir.join("edges.csv"))
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run butterfly-route")
}

#[test]
fn test_route_command() {
    let dir = tempfile::tempdir().unwrap();
    write_ladder(dir.path());

    let output = run(dir.path(), &["route", "--from", "0", "--to", "7"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Weight: 11"), "{stdout}");
}

#[test]
fn test_validate_command() {
    let dir = tempfile::tempdir().unwrap();
    write_ladder(dir.path());

    let output = run(dir.path(), &["validate", "--queries", "50", "--seed", "3"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("distances agree"), "{stdout}");
}

#[test]
fn test_build_writes_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    write_ladder(dir.path());
    let arcs = dir.path().join("arcs.csv");
    let levels = dir.path().join("levels.csv");

    let output = run(
        dir.path(),
        &[
            "build",
            "--arcs",
            arcs.to_str().unwrap(),
            "--levels",
            levels.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&levels).unwrap().lines().count(), 9);
    assert!(fs::read_to_string(&arcs).unwrap().starts_with("from,to,weight,contracted_via"));
}

#[test]
fn test_query_stored_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    write_ladder(dir.path());
    let arcs = dir.path().join("arcs.csv");
    let levels = dir.path().join("levels.csv");

    let output = run(
        dir.path(),
        &[
            "build",
            "--arcs",
            arcs.to_str().unwrap(),
            "--levels",
            levels.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());

    let output = Command::new(env!("CARGO_BIN_EXE_butterfly-route"))
        .args(["query", "--from", "0", "--to", "7"])
        .arg("--nodes")
        .arg(dir.path().join("nodes.csv"))
        .arg("--arcs")
        .arg(&arcs)
        .arg("--levels")
        .arg(&levels)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run butterfly-route");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Weight: 11"), "{stdout}");
}

#[test]
fn test_bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_ladder(dir.path());
    let config = dir.path().join("ch.toml");
    fs::write(&config, "witness_hop_limit = 0\n").unwrap();

    let output = run(
        dir.path(),
        &["build", "--config", config.to_str().unwrap()],
    );
    assert!(!output.status.success());
}
