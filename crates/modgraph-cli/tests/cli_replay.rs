use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn modgraph_cmd() -> Command {
    Command::cargo_bin("modgraph").unwrap()
}

#[test]
fn test_replay_prints_the_resolved_tree() {
    let tmp = TempDir::new().unwrap();
    let catalog = tmp.path().join("catalog.toml");
    fs::write(
        &catalog,
        r#"
[root]
id = "com.example:app:1.0"
dependencies = ["org:a:1.0", "org:missing:1.0"]

[[component]]
id = "org:a:1.0"
dependencies = ["org:b:1.0"]

[[component]]
id = "org:b:1.0"
"#,
    )
    .unwrap();
    let stream = tmp.path().join("graph.bin");

    modgraph_cmd()
        .arg("resolve")
        .arg(&catalog)
        .arg("--output")
        .arg(&stream)
        .assert()
        .failure();
    assert!(stream.is_file());

    modgraph_cmd()
        .arg("replay")
        .arg(&stream)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("project : (com.example:app:1.0)\n"))
        .stdout(predicate::str::contains("org:b:1.0"))
        .stdout(predicate::str::contains("org:missing:1.0 FAILED"))
        .stdout(predicate::str::contains("Unresolved dependencies (1):"));
}

#[test]
fn test_replay_rejects_corrupt_stream() {
    let tmp = TempDir::new().unwrap();
    let stream = tmp.path().join("graph.bin");
    fs::write(&stream, [7u8]).unwrap();

    modgraph_cmd()
        .arg("replay")
        .arg(&stream)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt"));
}

#[test]
fn test_replay_missing_file_fails() {
    let tmp = TempDir::new().unwrap();

    modgraph_cmd()
        .arg("replay")
        .arg(tmp.path().join("absent.bin"))
        .assert()
        .failure();
}
