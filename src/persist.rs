use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::config::RunSettings;
use crate::models::{DedupKey, NewJobPost, ScrapeBatch};
use crate::store::{JobStore, MAX_ROWS_PER_INSERT};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PersistReport {
    /// Usable records offered for insertion.
    pub candidates: usize,
    /// Skipped because the pair exists in the window or earlier in this batch.
    pub duplicates: usize,
    pub inserted: u64,
    pub failed_batches: usize,
}

/// Maps the batch to destination rows, dropping every `(company, title)` pair
/// already in `existing` and any repeat within the batch. First occurrence wins.
pub fn select_new_rows(batch: &ScrapeBatch, existing: &HashSet<DedupKey>, posted_by_id: i64, posted_at: DateTime<Utc>) -> (Vec<NewJobPost>, usize) {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    let mut rows = Vec::new();

    for record in batch.records.iter().filter(|r| r.is_usable()) {
        let row = NewJobPost::from_record(record, posted_by_id, posted_at);
        let key = row.dedup_key();
        if existing.contains(&key) || !seen.insert(key) {
            duplicates += 1;
            continue;
        }
        rows.push(row);
    }
    (rows, duplicates)
}

/// Start of the dedup window ending at `now`.
pub fn window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if days < 0 {
        return Err(anyhow!("dedup window of {} days is negative", days));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| anyhow!("dedup window of {} days is out of range", days))
}

/// Writes the new part of `batch` in chunks of `settings.batch_size`, never
/// more than one statement can bind. A failed chunk is logged and skipped;
/// the rest still go in.
pub async fn persist(store: &dyn JobStore, batch: &ScrapeBatch, settings: &RunSettings) -> Result<PersistReport> {
    let now = Utc::now();
    let since = window_start(now, settings.dedup_window_days)?;

    info!("Fetching existing job keys since {}...", since.format("%Y-%m-%d"));
    let existing = store.existing_keys(since).await.context("Failed to load existing jobs")?;
    debug!("{} existing keys in window", existing.len());

    let (rows, duplicates) = select_new_rows(batch, &existing, settings.posted_by_id, now);
    let mut report = PersistReport { candidates: rows.len() + duplicates, duplicates, ..Default::default() };
    if rows.is_empty() {
        info!("Nothing new to insert ({} duplicates)", duplicates);
        return Ok(report);
    }

    let chunk_size = settings.batch_size.clamp(1, MAX_ROWS_PER_INSERT);
    for (i, chunk) in rows.chunks(chunk_size).enumerate() {
        match store.insert_batch(chunk).await {
            Ok(count) => {
                debug!("batch {}: {} of {} rows inserted", i + 1, count, chunk.len());
                report.inserted += count;
            }
            Err(e) => {
                warn!("Failed to insert batch {} ({} rows): {:#}", i + 1, chunk.len(), e);
                report.failed_batches += 1;
            }
        }
    }

    info!(
        "Inserted {} new jobs ({} duplicates skipped, {} failed batches)",
        report.inserted, report.duplicates, report.failed_batches
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobRecord;
    use crate::store::SqliteStore;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn batch(records: Vec<JobRecord>) -> ScrapeBatch {
        ScrapeBatch { scrape_date: Utc::now(), records }
    }

    fn settings() -> RunSettings {
        RunSettings { table: "jobs".to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_skips_pairs_seen_in_window() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        let seeded = NewJobPost::from_record(&JobRecord::new("Acme", "Engineer", "https://acme.az/1"), 1, Utc::now() - Duration::days(5));
        store.insert_batch(&[seeded]).await.unwrap();

        let report = persist(
            &store,
            &batch(vec![JobRecord::new("Acme", "Engineer", "https://acme.az/2"), JobRecord::new("Acme", "Designer", "https://acme.az/3")]),
            &settings(),
        )
        .await
        .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_old_pairs_are_inserted_again() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        let seeded = NewJobPost::from_record(&JobRecord::new("Acme", "Engineer", ""), 1, Utc::now() - Duration::days(31));
        store.insert_batch(&[seeded]).await.unwrap();

        let report = persist(&store, &batch(vec![JobRecord::new("Acme", "Engineer", "")]), &settings()).await.unwrap();
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn test_inserts_everything_across_chunks() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        let records = (0..250).map(|i| JobRecord::new("Acme", format!("Role {}", i), "")).collect();

        let report = persist(&store, &batch(records), &settings()).await.unwrap();
        assert_eq!(report.inserted, 250);
        assert_eq!(report.candidates, 250);
        assert_eq!(store.count().unwrap(), 250);
    }

    #[tokio::test]
    async fn test_oversized_batch_size_is_split_to_fit_parameters() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        let records = (0..2500).map(|i| JobRecord::new("Acme", format!("Role {}", i), "")).collect();
        let settings = RunSettings { batch_size: 5000, ..settings() };

        let report = persist(&store, &batch(records), &settings).await.unwrap();
        assert_eq!(report.failed_batches, 0);
        assert_eq!(report.inserted, 2500);
        assert_eq!(store.count().unwrap(), 2500);
    }

    #[test]
    fn test_window_start_rejects_bad_lengths() {
        let now = Utc::now();
        assert_eq!(window_start(now, 30).unwrap(), now - Duration::days(30));
        assert_eq!(window_start(now, 0).unwrap(), now);
        assert!(window_start(now, -1).is_err());
        assert!(window_start(now, i64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_huge_window_fails_instead_of_panicking() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        let settings = RunSettings { dedup_window_days: i64::MAX, ..settings() };
        let result = persist(&store, &batch(vec![JobRecord::new("Acme", "Engineer", "")]), &settings).await;
        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeats_within_batch_keep_first() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        let records = vec![
            JobRecord::new("Acme", "Engineer", "https://first.az"),
            JobRecord::new("Acme", "Engineer", "https://second.az"),
            JobRecord::new("", "Engineer", "https://nobody.az"),
        ];

        let report = persist(&store, &batch(records), &settings()).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.candidates, 2);
    }

    #[tokio::test]
    async fn test_unique_violations_are_ignored() {
        let store = SqliteStore::open_in_memory("jobs").unwrap();
        store.execute("CREATE UNIQUE INDEX jobs_link ON jobs (apply_link)").unwrap();
        let seeded = NewJobPost::from_record(&JobRecord::new("Old", "Listing", "https://dup.az"), 1, Utc::now() - Duration::days(90));
        store.insert_batch(&[seeded]).await.unwrap();

        let records = vec![JobRecord::new("New", "Listing", "https://dup.az"), JobRecord::new("New", "Other", "https://fresh.az")];
        let report = persist(&store, &batch(records), &settings()).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed_batches, 0);
    }

    #[test]
    fn test_dedup_keys_use_truncated_values() {
        let long_title = "T".repeat(600);
        let existing: HashSet<_> = [DedupKey::new("Acme", "T".repeat(500))].into_iter().collect();
        let (rows, duplicates) = select_new_rows(&batch(vec![JobRecord::new("Acme", long_title, "")]), &existing, 1, Utc::now());
        assert!(rows.is_empty());
        assert_eq!(duplicates, 1);
    }

    /// Rejects the first chunk it sees and counts the rest.
    struct FlakyStore {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn existing_keys(&self, _since: DateTime<Utc>) -> Result<HashSet<DedupKey>> {
            Ok(HashSet::new())
        }

        async fn insert_batch(&self, rows: &[NewJobPost]) -> Result<u64> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            if first {
                bail!("connection reset");
            }
            Ok(rows.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_the_rest() {
        let store = FlakyStore { calls: Mutex::new(0) };
        let records = (0..250).map(|i| JobRecord::new("Acme", format!("Role {}", i), "")).collect();

        let report = persist(&store, &batch(records), &settings()).await.unwrap();
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.inserted, 150);
        assert_eq!(*store.calls.lock().unwrap(), 3);
    }
}
