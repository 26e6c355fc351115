/// SQL DDL for the campaign analytics store.
/// These two tables are the documented surface the planner may query.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id INTEGER PRIMARY KEY,
    campaign_name TEXT NOT NULL,
    objective TEXT NOT NULL,
    platform TEXT NOT NULL,
    ad_type TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_performance (
    performance_id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    campaign_id INTEGER NOT NULL REFERENCES campaigns(campaign_id),
    impressions INTEGER NOT NULL DEFAULT 0,
    clicks INTEGER NOT NULL DEFAULT 0,
    conversions REAL NOT NULL DEFAULT 0,
    spend REAL NOT NULL DEFAULT 0,
    reach INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_performance_campaign ON daily_performance(campaign_id);
CREATE INDEX IF NOT EXISTS idx_performance_date ON daily_performance(date);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
