use assert_cmd::Command;
use predicates::prelude::*;

fn datafs(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("datafs").unwrap();
    cmd.env_remove("DATAFS_CONFIG")
        .env("RUST_LOG", "off")
        .current_dir(dir)
        .arg("--dir")
        .arg(dir);
    cmd
}

#[test]
fn aliases_prints_mapping() {
    let d = tempfile::tempdir().unwrap();
    datafs(d.path())
        .arg("aliases")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("/data/a -> "));
}

#[test]
fn tool_list_is_json() {
    let d = tempfile::tempdir().unwrap();
    let out = datafs(d.path()).args(["tool", "list"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let names: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"apply_diff"));
    assert!(names.contains(&"list_allowed_directories"));
}

#[test]
fn tool_call_from_argument_and_stdin() {
    let d = tempfile::tempdir().unwrap();
    std::fs::write(d.path().join("a.txt"), "alpha\nbeta\n").unwrap();

    datafs(d.path())
        .args(["tool", "call", "apply_diff", r#"{"path":"/data/a/a.txt","diff":"@@@\n-beta\n+gamma\n"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ok":true"#));

    datafs(d.path())
        .args(["tool", "call", "read_file"])
        .write_stdin(r#"{"path":"/data/a/a.txt","head":1}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""text":"alpha\n""#));

    assert_eq!(
        std::fs::read_to_string(d.path().join("a.txt")).unwrap(),
        "alpha\ngamma\n"
    );
}

#[test]
fn tool_error_exits_one() {
    let d = tempfile::tempdir().unwrap();
    datafs(d.path())
        .args(["tool", "call", "read_file", r#"{"path":"/data/a/missing.txt"}"#])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""kind":"not_found""#))
        .stdout(predicate::str::contains(d.path().to_str().unwrap()).not());
}

#[test]
fn failed_patch_leaves_file_alone() {
    let d = tempfile::tempdir().unwrap();
    std::fs::write(d.path().join("a.txt"), "one\ntwo\n").unwrap();
    datafs(d.path())
        .args([
            "tool",
            "call",
            "apply_diff",
            r#"{"path":"/data/a/a.txt","diff":"@@@\n-one\n+ONE\n@@@\n-zzz\n+yyy\n"}"#,
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""kind":"patch_apply""#));
    assert_eq!(
        std::fs::read_to_string(d.path().join("a.txt")).unwrap(),
        "one\ntwo\n"
    );
}

#[test]
fn read_only_refuses_writes() {
    let d = tempfile::tempdir().unwrap();
    datafs(d.path())
        .args(["--read-only", "tool", "call", "create_directory", r#"{"path":"/data/a/new"}"#])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""kind":"read_only""#));
    assert!(!d.path().join("new").exists());
}

#[test]
fn config_file_supplies_directories() {
    let d = tempfile::tempdir().unwrap();
    let data = d.path().join("data");
    std::fs::create_dir(&data).unwrap();
    std::fs::write(
        d.path().join("datafs.toml"),
        format!("[fs]\nallowed_dirs = ['{}']\n", data.display()),
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("datafs").unwrap();
    cmd.env_remove("DATAFS_CONFIG")
        .env("RUST_LOG", "off")
        .current_dir(d.path())
        .arg("aliases")
        .assert()
        .success()
        .stdout(predicate::str::contains(data.to_str().unwrap()));
}

#[test]
fn no_directories_exits_two() {
    let d = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("datafs").unwrap();
    cmd.env_remove("DATAFS_CONFIG")
        .current_dir(d.path())
        .arg("aliases")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no allowed directories"));
}
