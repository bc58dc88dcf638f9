pub const SCHEMA: &str = r#"
-- tenders table (append-only deduplication ledger)
CREATE TABLE IF NOT EXISTS tenders (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    price REAL NOT NULL DEFAULT 0,
    region TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL,
    published_at TEXT,
    first_seen_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_tenders_first_seen_at ON tenders(first_seen_at DESC);

-- subscriber filters table (one row per subscriber, last write wins)
CREATE TABLE IF NOT EXISTS subscriber_filters (
    subscriber_id INTEGER PRIMARY KEY NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    region TEXT,
    max_price REAL,
    onboarding TEXT NOT NULL DEFAULT 'awaiting_keywords',
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
