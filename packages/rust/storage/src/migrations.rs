//! SQL migration definitions for the per-industry SourceScout database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: search_results, page_fetches, summaries, report_entries, runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Deduplicated search manifest (first-seen wins per url)
CREATE TABLE IF NOT EXISTS search_results (
    industry     TEXT NOT NULL,
    seq          INTEGER NOT NULL,
    url          TEXT NOT NULL,
    title        TEXT NOT NULL,
    snippet      TEXT NOT NULL,
    source_query TEXT NOT NULL,
    found_at     TEXT NOT NULL,
    PRIMARY KEY (industry, url),
    UNIQUE (industry, seq)
);

-- Latest fetch outcome per url, for diagnostics
CREATE TABLE IF NOT EXISTS page_fetches (
    industry       TEXT NOT NULL,
    url            TEXT NOT NULL,
    seq            INTEGER NOT NULL,
    ok             INTEGER NOT NULL,
    failure_reason TEXT,
    content_hash   TEXT,
    content_len    INTEGER,
    fetched_at     TEXT NOT NULL,
    PRIMARY KEY (industry, url)
);

-- Summary checkpoint: one row per url, written by the summarizer only
CREATE TABLE IF NOT EXISTS summaries (
    industry     TEXT NOT NULL,
    url          TEXT NOT NULL,
    seq          INTEGER NOT NULL,
    summary_text TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (industry, url)
);

CREATE INDEX IF NOT EXISTS idx_summaries_seq ON summaries(industry, seq);

-- Report: one row per scored url, written by the report generator only
CREATE TABLE IF NOT EXISTS report_entries (
    industry     TEXT NOT NULL,
    url          TEXT NOT NULL,
    seq          INTEGER NOT NULL,
    summary_text TEXT NOT NULL,
    verdict      TEXT NOT NULL,
    rationale    TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (industry, url)
);

CREATE INDEX IF NOT EXISTS idx_report_seq ON report_entries(industry, seq);

-- Run history
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    industry    TEXT NOT NULL,
    kind        TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_industry ON runs(industry);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
