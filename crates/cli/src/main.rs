// # -----------------------------
// # crates/cli/src/main.rs
// # -----------------------------
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datafs_cli::Setup;
use serde_json::{json, Value};
use std::io::{stdin, Read};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "datafs", version, about = "datafs CLI - sandboxed filesystem tools", long_about = None)]
struct Cli {
    /// Allowed directory (repeatable), exposed as /data/a, /data/b, ...
    #[arg(long = "dir", global = true)]
    dirs: Vec<String>,
    /// Config path (fallback DATAFS_CONFIG, else ./datafs.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,
    /// Hide and refuse write tools
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    read_only: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the virtual to real directory mapping
    Aliases,
    /// Tools: list and call
    Tool {
        #[command(subcommand)]
        action: ToolCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ToolCmd {
    /// List available tools (JSON)
    List,
    /// Call a tool
    Call {
        /// Tool name (see `datafs tool list`)
        name: String,
        /// JSON arguments, or '-' to read them from stdin (default)
        #[arg(default_value = "-")]
        args: String,
    },
}

fn main() {
    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}

fn real_main() -> Result<i32> {
    let cli = Cli::parse();
    datafs_cli::init_tracing("warn");
    let setup = Setup::load(&cli.dirs, cli.config_path.as_deref(), cli.read_only)?;

    match cli.command {
        Commands::Aliases => {
            println!("{}", setup.mapping());
        }
        Commands::Tool { action } => match action {
            ToolCmd::List => {
                println!("{}", serde_json::to_string_pretty(&setup.tools.descriptors())?);
            }
            ToolCmd::Call { name, args } => {
                let args = read_args(&args)?;
                let (reply, code) = match setup.tools.call(&name, args) {
                    Ok(text) => (json!({"ok": true, "result": {"text": text}}), 0),
                    Err(f) => (
                        json!({"ok": false, "kind": f.kind, "message": f.message}),
                        1,
                    ),
                };
                println!("{reply}");
                return Ok(code);
            }
        },
    }
    Ok(0)
}

fn read_args(input: &str) -> Result<Value> {
    let raw = if input == "-" {
        let mut s = String::new();
        stdin().read_to_string(&mut s).context("read args from stdin")?;
        s
    } else {
        input.to_string()
    };
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(&raw).context("args must be a JSON object")
}
