//! numstore Inspector
//!
//! Maintenance tool for looking inside a numstore database file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use numstore::{Config, Engine, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// numstore Inspector
#[derive(Parser, Debug)]
#[command(name = "numstore-inspect")]
#[command(about = "Inspect a numstore database file")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./numstore.db")]
    path: PathBuf,

    /// Skip page checksum verification
    #[arg(long)]
    no_verify: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// File-level statistics
    Stats,

    /// List every variable
    List,

    /// Validate the content tree of a variable
    Check {
        /// Variable name
        name: String,
    },

    /// Print the decoded content of a variable
    Dump {
        /// Variable name
        name: String,

        /// First element to print
        #[arg(short, long, default_value = "0")]
        start: u64,

        /// Maximum number of elements to print
        #[arg(short, long, default_value = "64")]
        count: u64,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if !args.path.exists() {
        tracing::error!("{} does not exist", args.path.display());
        std::process::exit(1);
    }

    let config = Config::builder()
        .path(&args.path)
        .verify_checksums(!args.no_verify)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&engine, args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(engine: &Engine, command: Commands) -> numstore::Result<()> {
    match command {
        Commands::Stats => {
            let vars = engine.list()?;
            println!("numstore v{}", numstore::VERSION);
            println!("page size:  {}", engine.config().page_size);
            println!("pages:      {}", engine.page_count());
            println!("free pages: {}", engine.free_list_len());
            println!("variables:  {}", vars.len());
        }
        Commands::List => {
            for var in engine.list()? {
                let elements = var.length.checked_div(var.ty.byte_size()).unwrap_or(0);
                println!(
                    "{:<32} {:<16} {:>12} elements  root={}",
                    var.name,
                    var.ty.to_string(),
                    elements,
                    var.root
                );
            }
        }
        Commands::Check { name } => {
            let stats = engine.check(&name)?;
            println!(
                "{}: ok  height={} leaves={} inner={} bytes={}",
                name, stats.height, stats.leaves, stats.inner_nodes, stats.length
            );
        }
        Commands::Dump { name, start, count } => {
            let values = engine.read_values(&name, start, count)?;
            for (i, value) in values.iter().enumerate() {
                println!("[{}] {}", start + i as u64, format_value(value));
            }
        }
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
    }
}
