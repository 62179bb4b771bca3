use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::record::PageRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            url        TEXT PRIMARY KEY,
            final_url  TEXT NOT NULL,
            status     INTEGER NOT NULL,
            html       TEXT NOT NULL,
            depth      INTEGER NOT NULL DEFAULT 0,
            fetched_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
            url          TEXT PRIMARY KEY,
            unit         TEXT,
            global_order INTEGER,
            depth        INTEGER NOT NULL,
            data         TEXT NOT NULL,
            recorded_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_order ON records(global_order);
        ",
    )?;
    Ok(())
}

// ── Response cache ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub html: String,
    pub depth: u32,
}

pub fn cached_page(conn: &Connection, url: &str) -> Result<Option<CachedPage>> {
    let page = conn
        .query_row(
            "SELECT url, final_url, status, html, depth FROM pages WHERE url = ?1",
            params![url],
            |row| {
                Ok(CachedPage {
                    url: row.get(0)?,
                    final_url: row.get(1)?,
                    status: row.get(2)?,
                    html: row.get(3)?,
                    depth: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(page)
}

pub fn save_page(conn: &Connection, page: &CachedPage) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pages (url, final_url, status, html, depth, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            page.url,
            page.final_url,
            page.status,
            page.html,
            page.depth,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn fetch_cached_pages(conn: &Connection) -> Result<Vec<CachedPage>> {
    let mut stmt =
        conn.prepare("SELECT url, final_url, status, html, depth FROM pages ORDER BY url")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CachedPage {
                url: row.get(0)?,
                final_url: row.get(1)?,
                status: row.get(2)?,
                html: row.get(3)?,
                depth: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Page records ──

pub fn save_records(conn: &Connection, records: &[PageRecord]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO records (url, unit, global_order, depth, data, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let now = Utc::now().to_rfc3339();
        for r in records {
            let data = serde_json::to_string(r)?;
            let placement = r.placement.as_ref();
            stmt.execute(params![
                r.url,
                placement.map(|p| p.unit.as_str()),
                placement.map(|p| p.global_order as i64),
                r.depth,
                data,
                now,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn clear_records(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM records", [])?)
}

/// All stored records, curriculum order first.
pub fn fetch_records(conn: &Connection) -> Result<Vec<PageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT url, data FROM records ORDER BY global_order IS NULL, global_order, url",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(url, data)| {
            serde_json::from_str(&data).with_context(|| format!("Corrupt record for {}", url))
        })
        .collect()
}

// ── Stats ──

pub struct Stats {
    pub pages: usize,
    pub records: usize,
    pub units: usize,
    pub blocks: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let records: usize = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
    let units: usize = conn.query_row(
        "SELECT COUNT(DISTINCT unit) FROM records WHERE unit IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let blocks = fetch_records(conn)?.iter().map(|r| r.blocks.len()).sum();
    Ok(Stats {
        pages,
        records,
        units,
        blocks,
    })
}

// ── Tests ──
