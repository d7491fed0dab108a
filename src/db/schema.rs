use rusqlite::Connection;

pub const SCHEMA: &str = r#"
-- article table; `url` uniqueness is enforced by idx_article_url
CREATE TABLE IF NOT EXISTS article (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    html TEXT,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    discovered_at TEXT DEFAULT (datetime('now')),
    extracted_at TEXT
);
"#;

// Added after the first release; older stores only have id, html, url, title
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("discovered_at", "ALTER TABLE article ADD COLUMN discovered_at TEXT"),
    ("extracted_at", "ALTER TABLE article ADD COLUMN extracted_at TEXT"),
];

const URL_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_article_url ON article(url)";

/// Creates the table, or brings a store written by an earlier release up to
/// the current layout.
pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;

    let existing = {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('article')")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        names
    };
    for (column, statement) in ADDED_COLUMNS {
        if !existing.iter().any(|name| name == column) {
            tracing::info!(column, "Adding missing article column");
            conn.execute_batch(statement)?;
        }
    }

    // Older stores did not enforce unique urls; keep the first row per url
    let removed = conn.execute(
        "DELETE FROM article WHERE id NOT IN (SELECT MIN(id) FROM article GROUP BY url)",
        [],
    )?;
    if removed > 0 {
        tracing::warn!(removed, "Removed duplicate article rows");
    }

    conn.execute_batch(URL_INDEX)?;
    Ok(())
}
