//! HeapKV CLI
//!
//! Command-line interface operating directly on a heap directory.

use std::process;

use clap::{Parser, Subcommand};
use heapkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// HeapKV CLI
#[derive(Parser, Debug)]
#[command(name = "heapkv-cli")]
#[command(about = "CLI for the HeapKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./heapkv_data")]
    data_dir: String,

    /// Page size in bytes (must match the existing heap file)
    #[arg(short, long, default_value = "4096")]
    page_size: usize,

    /// Per-operation timeout in milliseconds
    #[arg(short, long, default_value = "10000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Remove a key
    Remove {
        /// The key to remove
        key: String,
    },

    /// List every page and record, tombstones included
    Dump,

    /// Print heap statistics
    Stats,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,heapkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .page_size(args.page_size)
        .operation_timeout_ms(args.timeout_ms)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&engine, args.command) {
        tracing::error!("Command failed: {}", e);
        process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        process::exit(1);
    }
}

fn run(engine: &Engine, command: Commands) -> heapkv::Result<()> {
    match command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Remove { key } => match engine.remove(key.as_bytes())? {
            Some(value) => println!("removed {}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Dump => {
            for page in engine.pages() {
                let page = page?;
                println!(
                    "page {} ({} / {} bytes used)",
                    page.number(),
                    page.used(),
                    page.max_size()
                );
                for record in page.records() {
                    println!(
                        "  {} {} = {}",
                        if record.is_deleted() { "-" } else { "+" },
                        String::from_utf8_lossy(record.key()),
                        String::from_utf8_lossy(record.value())
                    );
                }
            }
        }
        Commands::Stats => {
            let locks = engine.lock_stats();
            println!("heap file:      {}", engine.heap_path().display());
            println!("page size:      {}", engine.config().page_size);
            println!("tail page:      {}", engine.tail_page_number());
            println!("live keys:      {}", engine.len());
            println!("locked pages:   {}", locks.active_pages);
            println!("lock pool live: {}", locks.pool_live);
        }
    }
    Ok(())
}
