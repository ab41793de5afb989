//! libSQL storage layer for per-industry pipeline checkpoints.
//!
//! The [`Storage`] struct wraps one libSQL database per industry holding the
//! search manifest, the fetch log, the summary checkpoint, the report, and
//! run history.
//!
//! **Access rules:**
//! - Each table has exactly one writing stage: aggregator → `search_results`,
//!   fetcher → `page_fetches`, summarizer → `summaries`, report generator →
//!   `report_entries`.
//! - Every write is a single autocommitted statement, durable on return.
//! - Read-only handles ([`Storage::open_readonly`]) are used for rendering and status.

mod migrations;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

use sourcescout_shared::{
    Industry, ManifestEntry, PageContent, Report, ReportEntry, Result, SearchResult,
    SourceScoutError, Summary, Verdict,
};

/// File name of the per-industry database.
pub const DB_FILE_NAME: &str = "sourcescout.db";

/// Path of an industry's database under `data_dir`.
pub fn industry_db_path(data_dir: &Path, industry: &Industry) -> PathBuf {
    data_dir.join(industry.as_str()).join(DB_FILE_NAME)
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SourceScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SourceScoutError::Storage(format!(
                "no database at {}: has this industry been run?",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SourceScoutError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SourceScoutError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Insert a new run record. Returns the generated run ID.
    pub async fn insert_run(&self, industry: &Industry, kind: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, industry, kind, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), industry.as_str(), kind, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Mark a run finished with its stats.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Number of runs recorded for an industry.
    pub async fn count_runs(&self, industry: &Industry) -> Result<u64> {
        self.count(
            "runs",
            "SELECT COUNT(*) FROM runs WHERE industry = ?1",
            industry,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Search manifest
    // -----------------------------------------------------------------------

    /// Append results to the manifest. URLs already present are left
    /// untouched (first-seen wins). Returns the number of new rows.
    pub async fn append_manifest(
        &self,
        industry: &Industry,
        results: &[SearchResult],
    ) -> Result<usize> {
        self.check_writable()?;
        let mut next_seq = self.max_seq("search_results", industry).await? + 1;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        for result in results {
            let changed = self
                .conn
                .execute(
                    "INSERT INTO search_results (industry, seq, url, title, snippet, source_query, found_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(industry, url) DO NOTHING",
                    params![
                        industry.as_str(),
                        next_seq as i64,
                        result.url.as_str(),
                        result.title.as_str(),
                        result.snippet.as_str(),
                        result.source_query.as_str(),
                        now.as_str(),
                    ],
                )
                .await
                .map_err(storage_err)?;

            if changed > 0 {
                next_seq += 1;
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// List the manifest in first-seen order.
    pub async fn list_manifest(&self, industry: &Industry) -> Result<Vec<ManifestEntry>> {
        const STORE: &str = "manifest";
        let mut rows = self
            .conn
            .query(
                "SELECT seq, url, title, snippet, source_query
                 FROM search_results WHERE industry = ?1 ORDER BY seq",
                params![industry.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(ManifestEntry {
                seq: get_seq(&row, 0, STORE)?,
                result: SearchResult {
                    url: get_text(&row, 1, STORE)?,
                    title: get_text(&row, 2, STORE)?,
                    snippet: get_text(&row, 3, STORE)?,
                    source_query: get_text(&row, 4, STORE)?,
                },
            });
        }
        Ok(results)
    }

    /// All URLs in the manifest.
    pub async fn manifest_urls(&self, industry: &Industry) -> Result<HashSet<String>> {
        self.url_set(
            "manifest",
            "SELECT url FROM search_results WHERE industry = ?1",
            industry,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Fetch log
    // -----------------------------------------------------------------------

    /// Record the latest fetch outcome for a URL (upserts).
    pub async fn record_fetch(
        &self,
        industry: &Industry,
        page: &PageContent,
        content_hash: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let ok = page.text().is_some();
        let content_len = page.text().map(|t| t.chars().count() as i64);
        self.conn
            .execute(
                "INSERT INTO page_fetches (industry, url, seq, ok, failure_reason, content_hash, content_len, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(industry, url) DO UPDATE SET
                   seq = excluded.seq,
                   ok = excluded.ok,
                   failure_reason = excluded.failure_reason,
                   content_hash = excluded.content_hash,
                   content_len = excluded.content_len,
                   fetched_at = excluded.fetched_at",
                params![
                    industry.as_str(),
                    page.url.as_str(),
                    page.seq as i64,
                    ok as i64,
                    page.failure_reason(),
                    content_hash,
                    content_len,
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Failed fetches from the log. Returns `Vec<(url, failure_reason)>` in seq order.
    pub async fn list_fetch_failures(&self, industry: &Industry) -> Result<Vec<(String, String)>> {
        const STORE: &str = "fetch log";
        let mut rows = self
            .conn
            .query(
                "SELECT url, failure_reason FROM page_fetches
                 WHERE industry = ?1 AND ok = 0 ORDER BY seq",
                params![industry.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let url = get_text(&row, 0, STORE)?;
            let reason = row
                .get::<String>(1)
                .unwrap_or_else(|_| "unknown failure".to_string());
            results.push((url, reason));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Summary checkpoint
    // -----------------------------------------------------------------------

    /// Persist a summary. Returns `false` if the URL already had one.
    pub async fn insert_summary(&self, summary: &Summary) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "INSERT INTO summaries (industry, url, seq, summary_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(industry, url) DO NOTHING",
                params![
                    summary.industry.as_str(),
                    summary.url.as_str(),
                    summary.seq as i64,
                    summary.summary_text.as_str(),
                    summary.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// URLs that already have a summary.
    pub async fn summarized_urls(&self, industry: &Industry) -> Result<HashSet<String>> {
        self.url_set(
            "summaries",
            "SELECT url FROM summaries WHERE industry = ?1",
            industry,
        )
        .await
    }

    /// List summaries in their stable seq order.
    pub async fn list_summaries(&self, industry: &Industry) -> Result<Vec<Summary>> {
        const STORE: &str = "summaries";
        let mut rows = self
            .conn
            .query(
                "SELECT seq, url, summary_text, created_at
                 FROM summaries WHERE industry = ?1 ORDER BY seq, url",
                params![industry.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(Summary {
                seq: get_seq(&row, 0, STORE)?,
                url: get_text(&row, 1, STORE)?,
                summary_text: get_text(&row, 2, STORE)?,
                industry: industry.clone(),
                created_at: get_timestamp(&row, 3, STORE)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Report
    // -----------------------------------------------------------------------

    /// Append a report entry. Returns `false` if the URL was already scored.
    pub async fn append_report_entry(
        &self,
        industry: &Industry,
        entry: &ReportEntry,
    ) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "INSERT INTO report_entries (industry, url, seq, summary_text, verdict, rationale, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(industry, url) DO NOTHING",
                params![
                    industry.as_str(),
                    entry.url.as_str(),
                    entry.seq as i64,
                    entry.summary_text.as_str(),
                    entry.verdict.as_str(),
                    entry.rationale.as_str(),
                    entry.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// URLs that already have a report entry.
    pub async fn scored_urls(&self, industry: &Industry) -> Result<HashSet<String>> {
        self.url_set(
            "report",
            "SELECT url FROM report_entries WHERE industry = ?1",
            industry,
        )
        .await
    }

    /// Load the full report in summary order.
    pub async fn list_report(&self, industry: &Industry) -> Result<Report> {
        const STORE: &str = "report";
        let mut rows = self
            .conn
            .query(
                "SELECT seq, url, summary_text, verdict, rationale, created_at
                 FROM report_entries WHERE industry = ?1 ORDER BY seq, url",
                params![industry.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let verdict_raw = get_text(&row, 3, STORE)?;
            let verdict: Verdict = verdict_raw
                .parse()
                .map_err(|e: SourceScoutError| SourceScoutError::integrity(STORE, e.to_string()))?;
            entries.push(ReportEntry {
                seq: get_seq(&row, 0, STORE)?,
                url: get_text(&row, 1, STORE)?,
                summary_text: get_text(&row, 2, STORE)?,
                verdict,
                rationale: get_text(&row, 4, STORE)?,
                created_at: get_timestamp(&row, 5, STORE)?,
            });
        }
        Ok(Report {
            industry: industry.clone(),
            entries,
        })
    }

    /// Delete every report entry for an industry. Returns the number removed.
    pub async fn clear_report(&self, industry: &Industry) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM report_entries WHERE industry = ?1",
                params![industry.as_str()],
            )
            .await
            .map_err(storage_err)
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Row counts across every store for an industry.
    pub async fn stats(&self, industry: &Industry) -> Result<StoreStats> {
        let manifest = self
            .count(
                "manifest",
                "SELECT COUNT(*) FROM search_results WHERE industry = ?1",
                industry,
            )
            .await?;
        let fetch_failures = self
            .count(
                "fetch log",
                "SELECT COUNT(*) FROM page_fetches WHERE industry = ?1 AND ok = 0",
                industry,
            )
            .await?;
        let summaries = self
            .count(
                "summaries",
                "SELECT COUNT(*) FROM summaries WHERE industry = ?1",
                industry,
            )
            .await?;
        let kept = self
            .count(
                "report",
                "SELECT COUNT(*) FROM report_entries WHERE industry = ?1 AND verdict = 'kept'",
                industry,
            )
            .await?;
        let discarded = self
            .count(
                "report",
                "SELECT COUNT(*) FROM report_entries WHERE industry = ?1 AND verdict = 'discarded'",
                industry,
            )
            .await?;

        Ok(StoreStats {
            manifest,
            fetch_failures,
            summaries,
            kept,
            discarded,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn max_seq(&self, table: &str, industry: &Industry) -> Result<u64> {
        let sql = format!("SELECT COALESCE(MAX(seq), 0) FROM {table} WHERE industry = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![industry.as_str()])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => get_seq(&row, 0, "manifest"),
            None => Ok(0),
        }
    }

    async fn count(&self, store: &'static str, sql: &str, industry: &Industry) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![industry.as_str()])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => get_seq(&row, 0, store),
            None => Ok(0),
        }
    }

    async fn url_set(
        &self,
        store: &'static str,
        sql: &str,
        industry: &Industry,
    ) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query(sql, params![industry.as_str()])
            .await
            .map_err(storage_err)?;
        let mut urls = HashSet::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            urls.insert(get_text(&row, 0, store)?);
        }
        Ok(urls)
    }
}

/// Row counts reported by `sourcescout status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub manifest: u64,
    pub fetch_failures: u64,
    pub summaries: u64,
    pub kept: u64,
    pub discarded: u64,
}

fn storage_err(e: libsql::Error) -> SourceScoutError {
    SourceScoutError::Storage(e.to_string())
}

fn get_text(row: &libsql::Row, idx: i32, store: &'static str) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| SourceScoutError::integrity(store, format!("column {idx}: {e}")))
}

fn get_seq(row: &libsql::Row, idx: i32, store: &'static str) -> Result<u64> {
    let raw = row
        .get::<i64>(idx)
        .map_err(|e| SourceScoutError::integrity(store, format!("column {idx}: {e}")))?;
    u64::try_from(raw)
        .map_err(|_| SourceScoutError::integrity(store, format!("negative value {raw} in column {idx}")))
}

fn get_timestamp(row: &libsql::Row, idx: i32, store: &'static str) -> Result<DateTime<Utc>> {
    let s = get_text(row, idx, store)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SourceScoutError::integrity(store, format!("invalid date '{s}': {e}")))
}
