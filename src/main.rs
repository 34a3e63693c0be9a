//! # Scanlens CLI
//!
//! One binary, two modes:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scanlens serve` | Start the caching proxy HTTP server |
//! | `scanlens lookup <barcode>` | Resolve one barcode and print the result |
//!
//! ## Examples
//!
//! ```bash
//! # Run the proxy on the configured bind address
//! scanlens --config ./config/scanlens.toml serve
//!
//! # One-shot lookup with a category hint (uses the on-disk cache)
//! scanlens lookup 737628064502 --category food
//!
//! # Force a live lookup
//! scanlens lookup 737628064502 --no-cache
//! ```
//!
//! The `--config` flag is optional; without a config file the defaults
//! (public upstream APIs, `.scanlens/cache`) apply.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use scanlens::cache::{CacheStore, FileCache, MemoryCache, SystemClock};
use scanlens::config::load_config;
use scanlens::models::{Category, LookupResult};
use scanlens::providers::build_adapters;
use scanlens::resolver::Resolver;
use scanlens::server::run_server;

#[derive(Parser)]
#[command(
    name = "scanlens",
    about = "Barcode product lookup with multi-source fallback and 24h caching",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/scanlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the caching proxy HTTP server
    Serve,
    /// Resolve one barcode and print the normalized product as JSON
    Lookup {
        /// Barcode/UPC/NDC code to resolve
        barcode: String,
        /// Category hint: food, medicine, or cosmetic. Reorders the
        /// provider chain, never filters it.
        #[arg(long)]
        category: Option<String>,
        /// Skip the on-disk cache for this lookup
        #[arg(long)]
        no_cache: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanlens=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => {
            if let Err(e) = run_server(&config).await {
                eprintln!("Server error: {:#}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::Lookup {
            barcode,
            category,
            no_cache,
        } => run_lookup(&config, &barcode, category.as_deref(), no_cache).await,
    }
}

/// One-shot lookup: the client-side counterpart of the proxy, with a
/// persistent cache so repeated scans of the same product stay offline.
async fn run_lookup(
    config: &scanlens::config::Config,
    barcode: &str,
    category: Option<&str>,
    no_cache: bool,
) -> ExitCode {
    let clock = Arc::new(SystemClock);
    // --no-cache swaps in a throwaway in-memory cache rather than changing
    // the resolver's contract.
    let cache: Arc<dyn CacheStore> = if no_cache {
        Arc::new(MemoryCache::new(clock))
    } else {
        Arc::new(FileCache::new(config.cache.dir.clone(), clock))
    };

    let adapters = match build_adapters(&config.providers) {
        Ok(adapters) => adapters,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let resolver = Resolver::new(adapters, cache);

    let hint = category.and_then(Category::from_hint);
    match resolver.resolve(barcode, hint).await {
        LookupResult::Found(product) => {
            match serde_json::to_string_pretty(&product) {
                Ok(body) => println!("{}", body),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        LookupResult::NotFound => {
            println!("Product not found in any source.");
            ExitCode::SUCCESS
        }
        LookupResult::Error(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}
