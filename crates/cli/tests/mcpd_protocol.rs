use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

struct Server {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl Server {
    fn spawn(dirs: &[&std::path::Path], extra: &[&str]) -> Self {
        let exe = env!("CARGO_BIN_EXE_datafs-mcpd");
        let mut child = Command::new(exe)
            .args(dirs)
            .args(extra)
            .env_remove("DATAFS_CONFIG")
            .current_dir(dirs[0])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn datafs-mcpd");
        let reader = BufReader::new(child.stdout.take().unwrap());
        Self { child, reader }
    }

    fn roundtrip(&mut self, line: &str) -> Value {
        let sin = self.child.stdin.as_mut().unwrap();
        writeln!(sin, "{line}").unwrap();
        sin.flush().unwrap();
        let mut out = String::new();
        self.reader.read_line(&mut out).unwrap();
        serde_json::from_str(&out).unwrap()
    }

    fn call(&mut self, name: &str, args: Value) -> Value {
        let msg = serde_json::json!({"type": "tool.call", "payload": {"name": name, "args": args}});
        self.roundtrip(&msg.to_string())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn ping_version_capabilities() {
    let d = tempfile::tempdir().unwrap();
    let mut srv = Server::spawn(&[d.path()], &["--server-version", "itest/1"]);
    assert_eq!(srv.roundtrip(r#"{"type":"ping"}"#)["type"], "pong");
    let v = srv.roundtrip(r#"{"type":"version"}"#);
    assert_eq!(v["payload"]["server"], "itest/1");
    assert_eq!(v["payload"]["server_name"], "datafs-mcpd");
    let caps = srv.roundtrip(r#"{"type":"capabilities"}"#);
    assert_eq!(caps["payload"]["tools"].as_array().unwrap().len(), 12);
}

#[test]
fn write_patch_and_read_back() {
    let d = tempfile::tempdir().unwrap();
    let mut srv = Server::spawn(&[d.path()], &[]);

    let r = srv.call(
        "write_file",
        serde_json::json!({"path": "/data/a/notes.txt", "content": "one\ntwo\nthree\n"}),
    );
    assert_eq!(r["payload"]["result"]["text"], "Wrote to /data/a/notes.txt");

    let r = srv.call(
        "apply_diff",
        serde_json::json!({"path": "/data/a/notes.txt", "diff": "@@@\n two\n-three\n+THREE\n"}),
    );
    assert_eq!(r["type"], "tool.result", "{r}");

    let r = srv.call("read_file", serde_json::json!({"path": "/data/a/notes.txt"}));
    assert_eq!(r["payload"]["result"]["text"], "one\ntwo\nTHREE\n");
    assert_eq!(
        std::fs::read_to_string(d.path().join("notes.txt")).unwrap(),
        "one\ntwo\nTHREE\n"
    );
}

#[test]
fn two_directories_get_two_aliases() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    std::fs::write(b.path().join("x.txt"), "from b").unwrap();
    let mut srv = Server::spawn(&[a.path(), b.path()], &[]);
    let r = srv.call("list_allowed_directories", serde_json::json!({}));
    assert_eq!(
        r["payload"]["result"]["text"],
        "### Allowed directories:\n/data/a\n/data/b"
    );
    let r = srv.call("read_file", serde_json::json!({"path": "/data/b/x.txt"}));
    assert_eq!(r["payload"]["result"]["text"], "from b");
}

#[test]
fn escapes_are_refused_without_leaking_real_paths() {
    let d = tempfile::tempdir().unwrap();
    let mut srv = Server::spawn(&[d.path()], &[]);
    let r = srv.call(
        "write_file",
        serde_json::json!({"path": "/data/a/../../escape.txt", "content": "x"}),
    );
    assert_eq!(r["type"], "tool.error");
    assert_eq!(r["payload"]["kind"], "access_denied");
    let msg = r["payload"]["message"].as_str().unwrap();
    assert!(msg.starts_with("Error writing: Permission denied"));
    assert!(!msg.contains(d.path().to_str().unwrap()));

    let r = srv.call("read_file", serde_json::json!({"path": "/etc/passwd"}));
    assert_eq!(r["payload"]["kind"], "invalid_path");
}

#[test]
fn garbage_does_not_kill_the_server() {
    let d = tempfile::tempdir().unwrap();
    let mut srv = Server::spawn(&[d.path()], &[]);
    let r = srv.roundtrip("{not json");
    assert_eq!(r["type"], "error");
    let r = srv.roundtrip(r#"{"type":"nope"}"#);
    assert_eq!(r["payload"]["message"], "unsupported type: nope");
    let r = srv.call("read_file", serde_json::json!({"path": "/data/a/x", "bogus": 1}));
    assert_eq!(r["payload"]["kind"], "schema_error");
    assert_eq!(srv.roundtrip(r#"{"type":"ping"}"#)["type"], "pong");
}

#[test]
fn read_only_hides_and_refuses_writes() {
    let d = tempfile::tempdir().unwrap();
    let mut srv = Server::spawn(&[d.path()], &["--read-only"]);
    let caps = srv.roundtrip(r#"{"type":"capabilities"}"#);
    assert_eq!(caps["payload"]["read_only"], true);
    let names = caps["payload"]["tools"].as_array().unwrap();
    assert!(!names.iter().any(|n| n == "write_file"));
    let r = srv.call(
        "write_file",
        serde_json::json!({"path": "/data/a/f", "content": "x"}),
    );
    assert_eq!(r["payload"]["kind"], "read_only");
    assert!(!d.path().join("f").exists());
}

#[test]
fn startup_fails_without_directories() {
    let d = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_datafs-mcpd"))
        .env_remove("DATAFS_CONFIG")
        .current_dir(d.path())
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no allowed directories"));
}

#[test]
fn startup_fails_on_missing_directory() {
    let d = tempfile::tempdir().unwrap();
    let missing = d.path().join("missing");
    let out = Command::new(env!("CARGO_BIN_EXE_datafs-mcpd"))
        .arg(&missing)
        .env_remove("DATAFS_CONFIG")
        .current_dir(d.path())
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("is not a directory"));
}

#[test]
fn startup_prints_mapping_to_stderr() {
    let d = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_datafs-mcpd"))
        .arg(d.path())
        .env_remove("DATAFS_CONFIG")
        .env("RUST_LOG", "off")
        .current_dir(d.path())
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("Virtual to real directory mappings:"));
    assert!(err.contains("/data/a -> "));
}
