use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::store::MAX_ROWS_PER_INSERT;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// About ten years; anything longer is a typo.
const MAX_DEDUP_WINDOW_DAYS: i64 = 3650;

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: Option<String>,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
    pub per_host_concurrency: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_base_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            per_host_concurrency: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Tunables shared by the orchestrator, the parsers and the persistence step.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub source_timeout: Duration,
    pub detail_concurrency: usize,
    pub batch_size: usize,
    pub dedup_window_days: i64,
    pub posted_by_id: i64,
    pub table: String,
    pub show_progress: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(180),
            detail_concurrency: 8,
            batch_size: 100,
            dedup_window_days: 30,
            posted_by_id: 1,
            table: "jobs_jobpost".to_string(),
            show_progress: false,
        }
    }
}

/// Optional credentials for sources that sit behind a login.
#[derive(Debug, Clone, Default)]
pub struct SourceCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub struct Config {
    pub db: DbConfig,
    pub fetch: FetchSettings,
    pub run: RunSettings,
    pub credentials: SourceCredentials,
}

impl Config {
    pub fn load() -> Result<Self> {
        let fetch_defaults = FetchSettings::default();
        let run_defaults = RunSettings::default();

        let table = env::var("JOB_TABLE").unwrap_or(run_defaults.table);
        if !TABLE_NAME.is_match(&table) {
            bail!("JOB_TABLE {:?} is not a plain SQL identifier", table);
        }

        let config = Self {
            db: DbConfig {
                host: non_empty("DB_HOST"),
                port: parse_or("DB_PORT", 5432)?,
                name: non_empty("DB_NAME"),
                user: non_empty("DB_USER"),
                password: non_empty("DB_PASSWORD"),
            },
            fetch: FetchSettings {
                retries: parse_or("FETCH_RETRIES", fetch_defaults.retries)?,
                retry_base_delay: Duration::from_millis(parse_or("RETRY_BASE_DELAY_MS", 500)?),
                request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 30)?),
                per_host_concurrency: parse_or("PER_HOST_CONCURRENCY", fetch_defaults.per_host_concurrency)?.max(1),
                user_agent: env::var("USER_AGENT").unwrap_or(fetch_defaults.user_agent),
            },
            run: RunSettings {
                source_timeout: Duration::from_secs(parse_or("SOURCE_TIMEOUT_SECS", 180)?),
                detail_concurrency: parse_or("DETAIL_CONCURRENCY", run_defaults.detail_concurrency)?.max(1),
                batch_size: in_range("BATCH_SIZE", parse_or("BATCH_SIZE", run_defaults.batch_size)?, 1..=MAX_ROWS_PER_INSERT)?,
                dedup_window_days: in_range(
                    "DEDUP_WINDOW_DAYS",
                    parse_or("DEDUP_WINDOW_DAYS", run_defaults.dedup_window_days)?,
                    1..=MAX_DEDUP_WINDOW_DAYS,
                )?,
                posted_by_id: parse_or("SCRAPER_USER_ID", run_defaults.posted_by_id)?,
                table,
                show_progress: run_defaults.show_progress,
            },
            credentials: SourceCredentials {
                email: non_empty("EMAIL"),
                password: non_empty("PASSWORD"),
            },
        };
        Ok(config)
    }
}

impl DbConfig {
    /// Names of the connection variables that are still unset.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_none() { missing.push("DB_HOST"); }
        if self.name.is_none() { missing.push("DB_NAME"); }
        if self.user.is_none() { missing.push("DB_USER"); }
        missing
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => raw.parse().with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn in_range<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + Display,
{
    if !range.contains(&value) {
        bail!("{} must be between {} and {}, got {}", key, range.start(), range.end(), value);
    }
    Ok(value)
}
