// # -----------------------------
// # crates/cli/src/bin/datafs-mcpd.rs
// # -----------------------------
//! Sandboxed filesystem tools over stdio.
//! Protocol JSON line-based: ping/version/capabilities and `tool.call`.

use anyhow::Result;
use clap::Parser;
use datafs_cli::Setup;
use datafs_common::ToolRequest;
use datafs_tools::FsTools;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "datafs-mcpd")]
#[command(about = "Sandboxed filesystem tools over stdio (line-delimited JSON)")]
struct Cli {
    /// Allowed directories, exposed as /data/a, /data/b, ... in this order
    dirs: Vec<String>,
    /// Announce server version string (default: [server].name)
    #[arg(long)]
    server_version: Option<String>,
    /// Config path (fallback DATAFS_CONFIG, else ./datafs.toml)
    #[arg(long = "config")]
    config_path: Option<PathBuf>,
    /// Serve read-only tools only
    #[arg(long, action = clap::ArgAction::SetTrue)]
    read_only: bool,
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("error: {e:#}");
        std::process::exit(2);
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    datafs_cli::init_tracing("info");
    let setup = Setup::load(&cli.dirs, cli.config_path.as_deref(), cli.read_only)?;
    let server_version = cli
        .server_version
        .clone()
        .unwrap_or_else(|| setup.config.server.name.clone());
    eprintln!(
        "datafs-mcpd running on stdio\nVirtual to real directory mappings:\n{}",
        setup.mapping()
    );
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(stdin.lock(), stdout.lock(), &setup.tools, &server_version)
}

fn serve<R: BufRead, W: Write>(input: R, mut out: W, tools: &FsTools, server_version: &str) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&line, tools, server_version);
        writeln!(out, "{reply}")?;
        out.flush()?;
    }
    tracing::info!("stdin closed, exiting");
    Ok(())
}

fn handle_line(line: &str, tools: &FsTools, server_version: &str) -> Value {
    let msg: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return error_reply(format!("invalid json: {}: {e}", truncate(line))),
    };
    let Some(typ) = msg.get("type").and_then(Value::as_str) else {
        return error_reply("missing type".to_string());
    };
    match typ {
        "ping" => json!({"type": "pong"}),
        "version" => json!({
            "type": "version",
            "payload": {
                "server": server_version,
                "server_name": "datafs-mcpd"
            }
        }),
        "capabilities" => {
            let names: Vec<&str> = tools.tools().into_iter().map(|t| t.name()).collect();
            json!({
                "type": "capabilities",
                "payload": {"tools": names, "read_only": tools.read_only()}
            })
        }
        "tool.call" => {
            let payload = msg.get("payload").cloned().unwrap_or(Value::Null);
            let req: ToolRequest = match serde_json::from_value(payload) {
                Ok(r) => r,
                Err(e) => return error_reply(format!("invalid tool.call payload: {e}")),
            };
            match tools.call(&req.name, req.args) {
                Ok(text) => json!({
                    "type": "tool.result",
                    "payload": {"name": req.name, "result": {"text": text}}
                }),
                Err(f) => json!({
                    "type": "tool.error",
                    "payload": {"name": req.name, "kind": f.kind, "message": f.message}
                }),
            }
        }
        other => error_reply(format!("unsupported type: {other}")),
    }
}

fn error_reply(message: String) -> Value {
    json!({"type": "error", "payload": {"message": message}})
}

fn truncate(s: &str) -> String {
    const MAX: usize = 200;
    match s.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}
