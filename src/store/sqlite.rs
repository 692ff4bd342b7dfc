//! `SQLite`-backed repository implementation.
//!
//! Schema and pool setup mirror the teacher's `LinkIndex::open` pattern:
//! WAL journal mode, a bounded busy timeout, and idempotent
//! `CREATE TABLE IF NOT EXISTS` migrations run once at open time.

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    AggregateStats, CategoryStat, CrawlCheckpoint, ConvertedImageZip, DiscoveredImage,
    MimeTypeStat, ScanId, ScanJob, ScanStatus, StatsContribution, SubmitterAddr,
};

use super::traits::{CheckpointRepository, ImageRepository, ScanRepository, StatsRepository, ZipRepository};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scan_jobs (
    id TEXT PRIMARY KEY,
    target_url TEXT NOT NULL,
    email TEXT,
    submitter_addr TEXT NOT NULL,
    submission_count INTEGER NOT NULL,
    status TEXT NOT NULL,
    convert_to_webp INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    pages_discovered INTEGER NOT NULL,
    pages_scanned INTEGER NOT NULL,
    non_webp_images_found INTEGER NOT NULL,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_status ON scan_jobs(status);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_submitter ON scan_jobs(submitter_addr);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_created_at ON scan_jobs(created_at);

CREATE TABLE IF NOT EXISTS discovered_images (
    id TEXT PRIMARY KEY,
    scan_job_id TEXT NOT NULL,
    image_url TEXT NOT NULL,
    page_urls TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    width INTEGER,
    height INTEGER,
    potential_savings_percent REAL NOT NULL,
    potential_savings_bytes INTEGER NOT NULL,
    discovered_at INTEGER NOT NULL,
    UNIQUE(scan_job_id, image_url)
);
CREATE INDEX IF NOT EXISTS idx_discovered_images_scan ON discovered_images(scan_job_id);

CREATE TABLE IF NOT EXISTS crawl_checkpoints (
    scan_job_id TEXT PRIMARY KEY,
    visited_urls TEXT NOT NULL,
    pending_urls TEXT NOT NULL,
    pages_visited INTEGER NOT NULL,
    pages_discovered INTEGER NOT NULL,
    non_webp_images_found INTEGER NOT NULL,
    current_url TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS converted_image_zips (
    download_id TEXT PRIMARY KEY,
    scan_job_id TEXT NOT NULL,
    filesystem_path TEXT NOT NULL,
    filename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    image_count INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_zips_scan ON converted_image_zips(scan_job_id);

CREATE TABLE IF NOT EXISTS aggregate_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    total_scans INTEGER NOT NULL,
    total_pages_crawled INTEGER NOT NULL,
    total_images_found INTEGER NOT NULL,
    total_original_size_bytes INTEGER NOT NULL,
    total_estimated_webp_size_bytes INTEGER NOT NULL,
    sum_of_savings_percent REAL NOT NULL,
    last_updated INTEGER NOT NULL,
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS aggregate_mime_stats (
    mime_type TEXT PRIMARY KEY,
    image_count INTEGER NOT NULL,
    original_size_bytes INTEGER NOT NULL,
    estimated_webp_size_bytes INTEGER NOT NULL,
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS aggregate_category_stats (
    category TEXT PRIMARY KEY,
    image_count INTEGER NOT NULL,
    original_size_bytes INTEGER NOT NULL,
    estimated_webp_size_bytes INTEGER NOT NULL,
    version INTEGER NOT NULL
);
"#;

/// Optimistic-concurrency retry ladder per `§4.8`.
const RETRY_BACKOFFS_MS: [u64; 3] = [10, 40, 160];

/// `SQLite`-backed implementation of every repository trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`, running schema
    /// migrations and seeding the singleton `aggregate_stats` row.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create database directory")?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .context("failed to open sqlite database")?;

        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("failed to run schema migrations")?;

        sqlx::query(
            "INSERT OR IGNORE INTO aggregate_stats \
             (id, total_scans, total_pages_crawled, total_images_found, \
              total_original_size_bytes, total_estimated_webp_size_bytes, \
              sum_of_savings_percent, last_updated, version) \
             VALUES (1, 0, 0, 0, 0, 0, 0.0, ?, 0)",
        )
        .bind(Utc::now().timestamp())
        .execute(&pool)
        .await
        .context("failed to seed aggregate_stats")?;

        Ok(Self { pool })
    }

    /// In-memory `SQLite` database, for integration tests that want real
    /// SQL semantics without touching the filesystem.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("failed to open in-memory sqlite database")?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;
        sqlx::query(
            "INSERT OR IGNORE INTO aggregate_stats \
             (id, total_scans, total_pages_crawled, total_images_found, \
              total_original_size_bytes, total_estimated_webp_size_bytes, \
              sum_of_savings_percent, last_updated, version) \
             VALUES (1, 0, 0, 0, 0, 0, 0.0, ?, 0)",
        )
        .bind(Utc::now().timestamp())
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn to_ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn status_str(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Queued => "queued",
        ScanStatus::Processing => "processing",
        ScanStatus::Completed => "completed",
        ScanStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> ScanStatus {
    match s {
        "processing" => ScanStatus::Processing,
        "completed" => ScanStatus::Completed,
        "failed" => ScanStatus::Failed,
        _ => ScanStatus::Queued,
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<ScanJob> {
    let id: String = row.try_get("id")?;
    let submitter_addr: String = row.try_get("submitter_addr")?;
    Ok(ScanJob {
        id: ScanId::from_str(&id)?,
        target_url: row.try_get("target_url")?,
        email: row.try_get("email")?,
        submitter_addr: SubmitterAddr::parse(&submitter_addr)
            .unwrap_or_else(|_| SubmitterAddr::from_ip("0.0.0.0".parse().unwrap())),
        submission_count: row.try_get::<i64, _>("submission_count")? as u32,
        status: parse_status(&row.try_get::<String, _>("status")?),
        convert_to_webp: row.try_get::<i64, _>("convert_to_webp")? != 0,
        created_at: from_ts(row.try_get("created_at")?),
        started_at: row.try_get::<Option<i64>, _>("started_at")?.map(from_ts),
        completed_at: row.try_get::<Option<i64>, _>("completed_at")?.map(from_ts),
        pages_discovered: row.try_get::<i64, _>("pages_discovered")? as u32,
        pages_scanned: row.try_get::<i64, _>("pages_scanned")? as u32,
        non_webp_images_found: row.try_get::<i64, _>("non_webp_images_found")? as u32,
        error_message: row.try_get("error_message")?,
    })
}

impl ScanRepository for SqliteStore {
    async fn insert(&self, job: &ScanJob) -> Result<()> {
        sqlx::query(
            "INSERT INTO scan_jobs \
             (id, target_url, email, submitter_addr, submission_count, status, \
              convert_to_webp, created_at, started_at, completed_at, \
              pages_discovered, pages_scanned, non_webp_images_found, error_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(&job.target_url)
        .bind(&job.email)
        .bind(job.submitter_addr.as_str())
        .bind(i64::from(job.submission_count))
        .bind(status_str(job.status))
        .bind(i64::from(job.convert_to_webp))
        .bind(to_ts(job.created_at))
        .bind(job.started_at.map(to_ts))
        .bind(job.completed_at.map(to_ts))
        .bind(i64::from(job.pages_discovered))
        .bind(i64::from(job.pages_scanned))
        .bind(i64::from(job.non_webp_images_found))
        .bind(&job.error_message)
        .execute(&self.pool)
        .await
        .context("failed to insert scan job")?;
        Ok(())
    }

    async fn get(&self, id: ScanId) -> Result<Option<ScanJob>> {
        let row = sqlx::query("SELECT * FROM scan_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch scan job")?;
        row.as_ref().map(row_to_job).transpose()
    }

    async fn update(&self, job: &ScanJob) -> Result<()> {
        sqlx::query(
            "UPDATE scan_jobs SET status = ?, started_at = ?, completed_at = ?, \
             pages_discovered = ?, pages_scanned = ?, non_webp_images_found = ?, \
             error_message = ? WHERE id = ?",
        )
        .bind(status_str(job.status))
        .bind(job.started_at.map(to_ts))
        .bind(job.completed_at.map(to_ts))
        .bind(i64::from(job.pages_discovered))
        .bind(i64::from(job.pages_scanned))
        .bind(i64::from(job.non_webp_images_found))
        .bind(&job.error_message)
        .bind(job.id.to_string())
        .execute(&self.pool)
        .await
        .context("failed to update scan job")?;
        Ok(())
    }

    async fn list_by_status(&self, status: ScanStatus) -> Result<Vec<ScanJob>> {
        let rows = sqlx::query("SELECT * FROM scan_jobs WHERE status = ?")
            .bind(status_str(status))
            .fetch_all(&self.pool)
            .await
            .context("failed to list scan jobs by status")?;
        rows.iter().map(row_to_job).collect()
    }

    async fn count_queued(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM scan_jobs WHERE status = 'queued'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("c")? as usize)
    }

    async fn count_queued_for_ip(&self, addr: &SubmitterAddr) -> Result<usize> {
        let row = sqlx::query(
            "SELECT COUNT(*) as c FROM scan_jobs WHERE status = 'queued' AND submitter_addr = ?",
        )
        .bind(addr.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("c")? as usize)
    }

    async fn last_submission_at(&self, addr: &SubmitterAddr) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MAX(created_at) as m FROM scan_jobs WHERE submitter_addr = ?")
            .bind(addr.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<Option<i64>, _>("m")?.map(from_ts))
    }

    async fn submission_count_for_ip(&self, addr: &SubmitterAddr) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM scan_jobs WHERE submitter_addr = ?")
            .bind(addr.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("c")? as u32 + 1)
    }

    async fn try_claim(&self, id: ScanId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scan_jobs SET status = 'processing', started_at = ? \
             WHERE id = ? AND status = 'queued'",
        )
        .bind(to_ts(now))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("failed to claim scan job")?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: ScanId) -> Result<()> {
        let id_str = id.to_string();
        sqlx::query("DELETE FROM discovered_images WHERE scan_job_id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM crawl_checkpoints WHERE scan_job_id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM converted_image_zips WHERE scan_job_id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM scan_jobs WHERE id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScanJob>> {
        let rows = sqlx::query("SELECT * FROM scan_jobs WHERE created_at < ?")
            .bind(to_ts(cutoff))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_job).collect()
    }
}

impl ImageRepository for SqliteStore {
    async fn find_by_url(&self, scan_id: ScanId, image_url: &str) -> Result<Option<DiscoveredImage>> {
        let row = sqlx::query("SELECT * FROM discovered_images WHERE scan_job_id = ? AND image_url = ?")
            .bind(scan_id.to_string())
            .bind(image_url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_image).transpose()
    }

    async fn insert(&self, image: &DiscoveredImage) -> Result<()> {
        let page_urls = serde_json::to_string(&image.page_urls)?;
        sqlx::query(
            "INSERT INTO discovered_images \
             (id, scan_job_id, image_url, page_urls, mime_type, size_bytes, width, height, \
              potential_savings_percent, potential_savings_bytes, discovered_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(image.id.to_string())
        .bind(image.scan_id.to_string())
        .bind(&image.image_url)
        .bind(page_urls)
        .bind(&image.mime_type)
        .bind(image.size_bytes as i64)
        .bind(image.width.map(i64::from))
        .bind(image.height.map(i64::from))
        .bind(image.potential_savings_percent)
        .bind(image.potential_savings_bytes as i64)
        .bind(to_ts(image.discovered_at))
        .execute(&self.pool)
        .await
        .context("failed to insert discovered image")?;
        Ok(())
    }

    async fn append_sighting(&self, scan_id: ScanId, image_url: &str, page_url: &str) -> Result<bool> {
        let Some(mut image) = self.find_by_url(scan_id, image_url).await? else {
            return Ok(false);
        };
        image.record_sighting(page_url.to_string());
        let page_urls = serde_json::to_string(&image.page_urls)?;
        sqlx::query("UPDATE discovered_images SET page_urls = ? WHERE id = ?")
            .bind(page_urls)
            .bind(image.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn list_for_scan(&self, scan_id: ScanId) -> Result<Vec<DiscoveredImage>> {
        let rows = sqlx::query("SELECT * FROM discovered_images WHERE scan_job_id = ?")
            .bind(scan_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_image).collect()
    }

    async fn delete_for_scan(&self, scan_id: ScanId) -> Result<()> {
        sqlx::query("DELETE FROM discovered_images WHERE scan_job_id = ?")
            .bind(scan_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_image(row: &sqlx::sqlite::SqliteRow) -> Result<DiscoveredImage> {
    let id: String = row.try_get("id")?;
    let scan_job_id: String = row.try_get("scan_job_id")?;
    let page_urls_json: String = row.try_get("page_urls")?;
    let page_urls: BTreeSet<String> = serde_json::from_str(&page_urls_json)?;
    Ok(DiscoveredImage {
        id: uuid::Uuid::parse_str(&id)?,
        scan_id: ScanId::from_str(&scan_job_id)?,
        image_url: row.try_get("image_url")?,
        page_urls,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
        width: row.try_get::<Option<i64>, _>("width")?.map(|w| w as u32),
        height: row.try_get::<Option<i64>, _>("height")?.map(|h| h as u32),
        potential_savings_percent: row.try_get("potential_savings_percent")?,
        potential_savings_bytes: row.try_get::<i64, _>("potential_savings_bytes")? as u64,
        discovered_at: from_ts(row.try_get("discovered_at")?),
    })
}

impl CheckpointRepository for SqliteStore {
    async fn upsert(&self, checkpoint: &CrawlCheckpoint) -> Result<()> {
        let visited = serde_json::to_string(&checkpoint.visited_urls)?;
        let pending = serde_json::to_string(&checkpoint.pending_urls)?;
        sqlx::query(
            "INSERT INTO crawl_checkpoints \
             (scan_job_id, visited_urls, pending_urls, pages_visited, pages_discovered, \
              non_webp_images_found, current_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(scan_job_id) DO UPDATE SET \
             visited_urls = excluded.visited_urls, pending_urls = excluded.pending_urls, \
             pages_visited = excluded.pages_visited, pages_discovered = excluded.pages_discovered, \
             non_webp_images_found = excluded.non_webp_images_found, \
             current_url = excluded.current_url, updated_at = excluded.updated_at",
        )
        .bind(checkpoint.scan_id.to_string())
        .bind(visited)
        .bind(pending)
        .bind(i64::from(checkpoint.pages_visited))
        .bind(i64::from(checkpoint.pages_discovered))
        .bind(i64::from(checkpoint.non_webp_images_found))
        .bind(&checkpoint.current_url)
        .bind(to_ts(checkpoint.created_at))
        .bind(to_ts(checkpoint.updated_at))
        .execute(&self.pool)
        .await
        .context("failed to upsert checkpoint")?;
        Ok(())
    }

    async fn get(&self, scan_id: ScanId) -> Result<Option<CrawlCheckpoint>> {
        let row = sqlx::query("SELECT * FROM crawl_checkpoints WHERE scan_job_id = ?")
            .bind(scan_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn delete(&self, scan_id: ScanId) -> Result<()> {
        sqlx::query("DELETE FROM crawl_checkpoints WHERE scan_job_id = ?")
            .bind(scan_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<CrawlCheckpoint> {
    let scan_job_id: String = row.try_get("scan_job_id")?;
    let visited_json: String = row.try_get("visited_urls")?;
    let pending_json: String = row.try_get("pending_urls")?;
    let visited_urls: BTreeSet<String> = serde_json::from_str(&visited_json)?;
    let pending_urls: VecDeque<String> = serde_json::from_str(&pending_json)?;
    Ok(CrawlCheckpoint {
        scan_id: ScanId::from_str(&scan_job_id)?,
        visited_urls,
        pending_urls,
        pages_visited: row.try_get::<i64, _>("pages_visited")? as u32,
        pages_discovered: row.try_get::<i64, _>("pages_discovered")? as u32,
        non_webp_images_found: row.try_get::<i64, _>("non_webp_images_found")? as u32,
        current_url: row.try_get("current_url")?,
        created_at: from_ts(row.try_get("created_at")?),
        updated_at: from_ts(row.try_get("updated_at")?),
    })
}

impl ZipRepository for SqliteStore {
    async fn insert(&self, zip: &ConvertedImageZip) -> Result<()> {
        sqlx::query(
            "INSERT INTO converted_image_zips \
             (download_id, scan_job_id, filesystem_path, filename, size_bytes, image_count, \
              created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(zip.download_id.to_string())
        .bind(zip.scan_id.to_string())
        .bind(zip.filesystem_path.to_string_lossy().to_string())
        .bind(&zip.filename)
        .bind(zip.size_bytes as i64)
        .bind(i64::from(zip.image_count))
        .bind(to_ts(zip.created_at))
        .bind(to_ts(zip.expires_at))
        .execute(&self.pool)
        .await
        .context("failed to insert converted zip")?;
        Ok(())
    }

    async fn get(&self, download_id: uuid::Uuid) -> Result<Option<ConvertedImageZip>> {
        let row = sqlx::query("SELECT * FROM converted_image_zips WHERE download_id = ?")
            .bind(download_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_zip).transpose()
    }

    async fn get_for_scan(&self, scan_id: ScanId) -> Result<Option<ConvertedImageZip>> {
        let row = sqlx::query("SELECT * FROM converted_image_zips WHERE scan_job_id = ?")
            .bind(scan_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_zip).transpose()
    }

    async fn delete(&self, download_id: uuid::Uuid) -> Result<()> {
        sqlx::query("DELETE FROM converted_image_zips WHERE download_id = ?")
            .bind(download_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ConvertedImageZip>> {
        let rows = sqlx::query("SELECT * FROM converted_image_zips WHERE expires_at <= ?")
            .bind(to_ts(now))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_zip).collect()
    }
}

fn row_to_zip(row: &sqlx::sqlite::SqliteRow) -> Result<ConvertedImageZip> {
    let download_id: String = row.try_get("download_id")?;
    let scan_job_id: String = row.try_get("scan_job_id")?;
    Ok(ConvertedImageZip {
        download_id: uuid::Uuid::parse_str(&download_id)?,
        scan_id: ScanId::from_str(&scan_job_id)?,
        filesystem_path: row.try_get::<String, _>("filesystem_path")?.into(),
        filename: row.try_get("filename")?,
        size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
        image_count: row.try_get::<i64, _>("image_count")? as u32,
        created_at: from_ts(row.try_get("created_at")?),
        expires_at: from_ts(row.try_get("expires_at")?),
    })
}

impl StatsRepository for SqliteStore {
    async fn get(&self) -> Result<AggregateStats> {
        let row = sqlx::query("SELECT * FROM aggregate_stats WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .context("failed to fetch aggregate stats")?;
        row_to_stats(&row)
    }

    async fn apply(&self, delta: &StatsContribution) -> Result<AggregateStats> {
        self.retry_stats_update(delta, true).await
    }

    async fn subtract(&self, delta: &StatsContribution) -> Result<AggregateStats> {
        self.retry_stats_update(delta, false).await
    }

    async fn upsert_mime_stat(&self, mime_type: &str, delta: &StatsContribution) -> Result<MimeTypeStat> {
        self.retry_mime_update(mime_type, delta, true).await
    }

    async fn subtract_mime_stat(&self, mime_type: &str, delta: &StatsContribution) -> Result<MimeTypeStat> {
        self.retry_mime_update(mime_type, delta, false).await
    }

    async fn list_mime_stats(&self) -> Result<Vec<MimeTypeStat>> {
        let rows = sqlx::query("SELECT * FROM aggregate_mime_stats")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_mime_stat).collect()
    }

    async fn upsert_category_stat(&self, category: &str, delta: &StatsContribution) -> Result<CategoryStat> {
        self.retry_category_update(category, delta, true).await
    }

    async fn subtract_category_stat(&self, category: &str, delta: &StatsContribution) -> Result<CategoryStat> {
        self.retry_category_update(category, delta, false).await
    }

    async fn list_category_stats(&self) -> Result<Vec<CategoryStat>> {
        let rows = sqlx::query("SELECT * FROM aggregate_category_stats")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_category_stat).collect()
    }
}

impl SqliteStore {
    /// Optimistic read-modify-write of the singleton stats row, bounded by
    /// the retry ladder named in `§4.8`.
    async fn retry_stats_update(&self, delta: &StatsContribution, add: bool) -> Result<AggregateStats> {
        for (attempt, backoff_ms) in [0].into_iter().chain(RETRY_BACKOFFS_MS).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            let current = StatsRepository::get(self).await?;
            let mut next = current.clone();
            let now = Utc::now();
            if add {
                next.apply_contribution(delta, now);
            } else {
                next.subtract_contribution(delta, now);
            }
            let result = sqlx::query(
                "UPDATE aggregate_stats SET total_scans = ?, total_pages_crawled = ?, \
                 total_images_found = ?, total_original_size_bytes = ?, \
                 total_estimated_webp_size_bytes = ?, sum_of_savings_percent = ?, \
                 last_updated = ?, version = ? WHERE id = 1 AND version = ?",
            )
            .bind(next.total_scans as i64)
            .bind(next.total_pages_crawled as i64)
            .bind(next.total_images_found as i64)
            .bind(next.total_original_size_bytes as i64)
            .bind(next.total_estimated_webp_size_bytes as i64)
            .bind(next.sum_of_savings_percent)
            .bind(to_ts(next.last_updated))
            .bind(next.version as i64)
            .bind(current.version as i64)
            .execute(&self.pool)
            .await
            .context("failed to write aggregate stats")?;

            if result.rows_affected() == 1 {
                return Ok(next);
            }
        }
        anyhow::bail!("exhausted optimistic retry budget updating aggregate stats")
    }

    async fn retry_mime_update(&self, mime_type: &str, delta: &StatsContribution, add: bool) -> Result<MimeTypeStat> {
        for (attempt, backoff_ms) in [0].into_iter().chain(RETRY_BACKOFFS_MS).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            let current = self.get_mime_stat(mime_type).await?;
            let mut next = current.clone();
            if add {
                next.image_count += delta.images_found;
                next.original_size_bytes += delta.original_size_bytes;
                next.estimated_webp_size_bytes += delta.estimated_webp_size_bytes;
            } else {
                next.image_count = next.image_count.saturating_sub(delta.images_found);
                next.original_size_bytes = next.original_size_bytes.saturating_sub(delta.original_size_bytes);
                next.estimated_webp_size_bytes =
                    next.estimated_webp_size_bytes.saturating_sub(delta.estimated_webp_size_bytes);
            }
            next.version += 1;
            let result = sqlx::query(
                "INSERT INTO aggregate_mime_stats (mime_type, image_count, original_size_bytes, \
                 estimated_webp_size_bytes, version) VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(mime_type) DO UPDATE SET image_count = excluded.image_count, \
                 original_size_bytes = excluded.original_size_bytes, \
                 estimated_webp_size_bytes = excluded.estimated_webp_size_bytes, \
                 version = excluded.version WHERE aggregate_mime_stats.version = ?",
            )
            .bind(&next.mime_type)
            .bind(next.image_count as i64)
            .bind(next.original_size_bytes as i64)
            .bind(next.estimated_webp_size_bytes as i64)
            .bind(next.version as i64)
            .bind(current.version as i64)
            .execute(&self.pool)
            .await
            .context("failed to write mime stat")?;

            if result.rows_affected() == 1 {
                return Ok(next);
            }
        }
        anyhow::bail!("exhausted optimistic retry budget updating mime stat {mime_type}")
    }

    async fn retry_category_update(&self, category: &str, delta: &StatsContribution, add: bool) -> Result<CategoryStat> {
        for (attempt, backoff_ms) in [0].into_iter().chain(RETRY_BACKOFFS_MS).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            let current = self.get_category_stat(category).await?;
            let mut next = current.clone();
            if add {
                next.image_count += delta.images_found;
                next.original_size_bytes += delta.original_size_bytes;
                next.estimated_webp_size_bytes += delta.estimated_webp_size_bytes;
            } else {
                next.image_count = next.image_count.saturating_sub(delta.images_found);
                next.original_size_bytes = next.original_size_bytes.saturating_sub(delta.original_size_bytes);
                next.estimated_webp_size_bytes =
                    next.estimated_webp_size_bytes.saturating_sub(delta.estimated_webp_size_bytes);
            }
            next.version += 1;
            let result = sqlx::query(
                "INSERT INTO aggregate_category_stats (category, image_count, original_size_bytes, \
                 estimated_webp_size_bytes, version) VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(category) DO UPDATE SET image_count = excluded.image_count, \
                 original_size_bytes = excluded.original_size_bytes, \
                 estimated_webp_size_bytes = excluded.estimated_webp_size_bytes, \
                 version = excluded.version WHERE aggregate_category_stats.version = ?",
            )
            .bind(&next.category)
            .bind(next.image_count as i64)
            .bind(next.original_size_bytes as i64)
            .bind(next.estimated_webp_size_bytes as i64)
            .bind(next.version as i64)
            .bind(current.version as i64)
            .execute(&self.pool)
            .await
            .context("failed to write category stat")?;

            if result.rows_affected() == 1 {
                return Ok(next);
            }
        }
        anyhow::bail!("exhausted optimistic retry budget updating category stat {category}")
    }

    async fn get_mime_stat(&self, mime_type: &str) -> Result<MimeTypeStat> {
        let row = sqlx::query("SELECT * FROM aggregate_mime_stats WHERE mime_type = ?")
            .bind(mime_type)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => row_to_mime_stat(&r),
            None => Ok(MimeTypeStat::new(mime_type.to_string())),
        }
    }

    async fn get_category_stat(&self, category: &str) -> Result<CategoryStat> {
        let row = sqlx::query("SELECT * FROM aggregate_category_stats WHERE category = ?")
            .bind(category)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => row_to_category_stat(&r),
            None => Ok(CategoryStat::new(category.to_string())),
        }
    }
}

fn row_to_stats(row: &sqlx::sqlite::SqliteRow) -> Result<AggregateStats> {
    Ok(AggregateStats {
        total_scans: row.try_get::<i64, _>("total_scans")? as u64,
        total_pages_crawled: row.try_get::<i64, _>("total_pages_crawled")? as u64,
        total_images_found: row.try_get::<i64, _>("total_images_found")? as u64,
        total_original_size_bytes: row.try_get::<i64, _>("total_original_size_bytes")? as u64,
        total_estimated_webp_size_bytes: row.try_get::<i64, _>("total_estimated_webp_size_bytes")? as u64,
        sum_of_savings_percent: row.try_get("sum_of_savings_percent")?,
        last_updated: from_ts(row.try_get("last_updated")?),
        version: row.try_get::<i64, _>("version")? as u64,
    })
}

fn row_to_mime_stat(row: &sqlx::sqlite::SqliteRow) -> Result<MimeTypeStat> {
    Ok(MimeTypeStat {
        mime_type: row.try_get("mime_type")?,
        image_count: row.try_get::<i64, _>("image_count")? as u64,
        original_size_bytes: row.try_get::<i64, _>("original_size_bytes")? as u64,
        estimated_webp_size_bytes: row.try_get::<i64, _>("estimated_webp_size_bytes")? as u64,
        version: row.try_get::<i64, _>("version")? as u64,
    })
}

fn row_to_category_stat(row: &sqlx::sqlite::SqliteRow) -> Result<CategoryStat> {
    Ok(CategoryStat {
        category: row.try_get("category")?,
        image_count: row.try_get::<i64, _>("image_count")? as u64,
        original_size_bytes: row.try_get::<i64, _>("original_size_bytes")? as u64,
        estimated_webp_size_bytes: row.try_get::<i64, _>("estimated_webp_size_bytes")? as u64,
        version: row.try_get::<i64, _>("version")? as u64,
    })
}
