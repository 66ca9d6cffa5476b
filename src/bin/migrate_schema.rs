//! CLI tool to migrate a legacy document store to the versioned schema.
//!
//! Usage:
//!   cargo run --bin migrate-schema -- --lab-name lab-collabora --limit 1000

use std::env;

use kernel_report_ingest::config::Config;
use kernel_report_ingest::services::migrate::{run_migration, MigrationContext};
use kernel_report_ingest::store::{Collection, SqliteStore, Store};

fn main() {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: could not set tracing subscriber");
    }

    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut lab_name: Option<String> = None;
    let mut limit: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--lab-name" | "-n" => {
                i += 1;
                if i < args.len() {
                    lab_name = Some(args[i].clone());
                }
            }
            "--limit" | "-l" => {
                i += 1;
                if i < args.len() {
                    match args[i].parse::<usize>() {
                        Ok(n) => limit = Some(n),
                        Err(_) => {
                            eprintln!("Error: --limit must be a number, got '{}'", args[i]);
                            std::process::exit(1);
                        }
                    }
                }
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let store = match SqliteStore::open(&config.database_url) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening store at {}: {}", config.database_url, e);
            std::process::exit(1);
        }
    };

    let lab_name = lab_name.unwrap_or_else(|| config.lab_name.clone());
    let limit = limit.or(config.migration_limit);

    let mut ctx = MigrationContext::new(lab_name, limit);
    let stats = match run_migration(&store, &mut ctx) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error running migration: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("Migration complete");
    println!("  Scanned:      {}", stats.scanned);
    println!("  Migrated:     {}", stats.migrated);
    println!("  Up to date:   {}", stats.skipped);
    println!("  Errors:       {}", stats.errors);
    println!("  Remap misses: {}", stats.remap_misses);
    println!();

    // Sanity read: every collection must still answer a count.
    for collection in Collection::ALL {
        match store.count(collection) {
            Ok(count) => println!("  {:<12} {} documents", collection.name(), count),
            Err(e) => {
                eprintln!("Error reading {} collection after migration: {}", collection, e);
                std::process::exit(1);
            }
        }
    }

    if stats.errors > 0 {
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage: migrate-schema [--lab-name <name>] [--limit <n>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --lab-name, -n  Lab name for legacy boot reports without one");
    eprintln!("                  (default: KRI_LAB_NAME or '{}')",
        kernel_report_ingest::config::defaults::DEV_LAB_NAME);
    eprintln!("  --limit, -l     Maximum documents to migrate per collection");
    eprintln!("  --help, -h      Show this help");
    eprintln!();
}
