use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use docbridge::value::{Timestamp, ValueCodec};
use docbridge::{Bridge, BridgeError, BridgeResult, MemoryStore, PluginResult};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "docbridge", version, about = "Document query bridge CLI", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, DOCBRIDGE_CONFIG or ./docbridge.toml is used.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run a JSON operation list against a collection")]
    Query {
        #[arg(long, help = "JSON file with {\"collection\": {\"id\": {...}}} data")]
        data: PathBuf,
        #[arg(long, help = "Collection path")]
        collection: String,
        #[arg(long, help = "Operation list as JSON, or @file to read it from a file")]
        ops: Option<String>,
    },
    #[command(about = "Read a single document")]
    Get {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        id: String,
    },
    #[command(name = "wrap-date", about = "Print the wire form of a timestamp in milliseconds")]
    WrapDate {
        #[arg(allow_hyphen_values = true)]
        millis: i64,
    },
}

fn read_json(path: &Path) -> BridgeResult<Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::Io(format!("{}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}

fn parse_ops(arg: &str) -> BridgeResult<Value> {
    match arg.strip_prefix('@') {
        Some(file) => read_json(Path::new(file)),
        None => Ok(serde_json::from_str(arg)?),
    }
}

fn bridge_for(data: &Path) -> BridgeResult<Bridge> {
    let store = MemoryStore::new();
    store.load_json(&read_json(data)?, &ValueCodec::global())?;
    Ok(Bridge::new(Arc::new(store)))
}

fn run(cli: Cli) -> BridgeResult<PluginResult> {
    docbridge::init(cli.config.as_deref())?;
    match cli.command {
        Commands::Query { data, collection, ops } => {
            let ops = ops.as_deref().map(parse_ops).transpose()?;
            Ok(bridge_for(&data)?.collection_get(&collection, ops.as_ref()))
        }
        Commands::Get { data, collection, id } => Ok(bridge_for(&data)?.doc_get(&collection, &id)),
        Commands::WrapDate { millis } => {
            Ok(PluginResult::ok(ValueCodec::global().wrap_date(Timestamp::from_millis(millis))))
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let result = run(cli).unwrap_or_else(|e| PluginResult::error(e.to_string()));
    match serde_json::to_string_pretty(&result) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: {e}"),
    }
    if !result.is_ok() {
        std::process::exit(1);
    }
}
