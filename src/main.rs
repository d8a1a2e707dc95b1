mod config;
mod fetch;
mod models;
mod orchestrator;
mod persist;
mod pipeline;
mod sources;
mod store;

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use log::{info, warn};

use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::pipeline::RunOptions;
use crate::sources::ScrapeContext;
use crate::store::{JobStore, PostgresStore, SqliteStore};

fn flag_value<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter().find_map(|a| a.strip_prefix(prefix)).filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = std::env::args().collect();
    let is_verbose = args.iter().any(|a| a == "--log");
    let default_level = if is_verbose { "info" } else { "warn" };

    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));

    let mut parsers = sources::registry();
    if args.iter().any(|a| a == "--list") {
        for parser in &parsers {
            println!("{:<18} {}", parser.name(), parser.pagination());
        }
        return Ok(());
    }

    if let Some(only) = flag_value(&args, "--only=") {
        let wanted: HashSet<&str> = only.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        let unknown: Vec<&str> = wanted.iter().copied().filter(|w| !parsers.iter().any(|p| p.name() == *w)).collect();
        if !unknown.is_empty() {
            bail!("Unknown sources: {} (see --list)", unknown.join(", "));
        }
        parsers.retain(|p| wanted.contains(p.name()));
        info!("Limiting run to {} sources.", parsers.len());
    }

    let mut config = Config::load()?;
    config.run.show_progress = std::io::stderr().is_terminal();
    if config.credentials.email.is_none() || config.credentials.password.is_none() {
        warn!("Email or password not set in environment variables.");
    }

    let options = RunOptions {
        dry_run: args.iter().any(|a| a == "--dry-run"),
        dump_path: flag_value(&args, "--dump=").map(PathBuf::from),
    };
    let local = flag_value(&args, "--local=").map(PathBuf::from);
    match &local {
        Some(path) => info!("Mode: LOCAL (SQLite at {})", path.display()),
        None => info!("Mode: PROD (PostgreSQL)"),
    }

    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
    let ctx = Arc::new(ScrapeContext::new(fetcher, &config.run));

    let db = config.db.clone();
    let table = config.run.table.clone();
    let summary = pipeline::run(parsers, ctx, &config.run, &options, || async move {
        let store: Box<dyn JobStore> = match local {
            Some(path) => Box::new(SqliteStore::open(&path, &table)?),
            None => Box::new(PostgresStore::connect(&db, &table).await?),
        };
        Ok::<_, anyhow::Error>(store)
    })
    .await?;

    println!("{}", summary);
    Ok(())
}
