use crate::registration::RegistrationRecord;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result, Row, TransactionBehavior, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Durable domain → registration store.
///
/// Rows are only ever appended. Readers see the first row stored for a
/// domain, so a duplicate appended by a concurrent writer is invisible until
/// [`RegistrationCache::compact`] removes it.
pub struct RegistrationCache {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub rows: usize,
    pub domains: usize,
    pub unknown_age: usize,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn date_to_sql(date: &Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.to_rfc3339())
}

fn date_from_sql(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn row_to_record(row: &Row<'_>) -> Result<RegistrationRecord> {
    Ok(RegistrationRecord {
        domain: row.get(0)?,
        domain_age_days: row.get(1)?,
        registrar: row.get(2)?,
        creation_date: date_from_sql(row.get(3)?),
        expiration_date: date_from_sql(row.get(4)?),
    })
}

const SELECT_COLUMNS: &str =
    "SELECT domain, domain_age_days, registrar, creation_date, expiration_date FROM registrations";

impl RegistrationCache {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let cache = RegistrationCache {
            conn: Mutex::new(conn),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        self.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS registrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL,
                domain_age_days INTEGER NOT NULL DEFAULT -1,
                registrar TEXT,
                creation_date TEXT,      -- RFC 3339, UTC
                expiration_date TEXT,    -- RFC 3339, UTC
                cached_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_registrations_domain ON registrations(domain, id);
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First-stored record for `domain`, if any.
    pub fn get(&self, domain: &str) -> Result<Option<RegistrationRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE domain = ?1 ORDER BY id LIMIT 1",
            SELECT_COLUMNS
        ))?;

        stmt.query_row(params![domain], row_to_record).optional()
    }

    /// Unconditional append. Prefer [`Self::append_if_absent`].
    pub fn append(&self, record: &RegistrationRecord) -> Result<()> {
        let conn = self.lock();
        insert(&conn, record)
    }

    /// Appends `record` unless its domain is already cached, in one write
    /// transaction. Returns whichever record is now authoritative.
    pub fn append_if_absent(&self, record: &RegistrationRecord) -> Result<RegistrationRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!("{} WHERE domain = ?1 ORDER BY id LIMIT 1", SELECT_COLUMNS),
                params![&record.domain],
                row_to_record,
            )
            .optional()?;

        let authoritative = match existing {
            Some(existing) => existing,
            None => {
                insert(&tx, record)?;
                record.clone()
            }
        };

        tx.commit()?;
        Ok(authoritative)
    }

    /// Deletes every row except the first one per domain. Returns rows removed.
    pub fn compact(&self) -> Result<usize> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM registrations
             WHERE id NOT IN (SELECT MIN(id) FROM registrations GROUP BY domain)",
            [],
        )?;
        Ok(removed)
    }

    /// Raw row count, duplicates included.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM registrations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock();
        let (rows, domains): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT domain) FROM registrations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let unknown_age: i64 = conn.query_row(
            "SELECT COUNT(*) FROM registrations r
             WHERE r.domain_age_days = -1
               AND r.id IN (SELECT MIN(id) FROM registrations GROUP BY domain)",
            [],
            |row| row.get(0),
        )?;

        Ok(CacheStats {
            rows: rows as usize,
            domains: domains as usize,
            unknown_age: unknown_age as usize,
        })
    }

    /// One record per domain (the first stored), in first-seen order.
    pub fn all(&self) -> Result<Vec<RegistrationRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE id IN (SELECT MIN(id) FROM registrations GROUP BY domain) ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>>>()?;

        Ok(records)
    }
}

fn insert(conn: &Connection, record: &RegistrationRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO registrations (
            domain, domain_age_days, registrar, creation_date, expiration_date, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &record.domain,
            record.domain_age_days,
            &record.registrar,
            date_to_sql(&record.creation_date),
            date_to_sql(&record.expiration_date),
            current_timestamp(),
        ],
    )?;
    Ok(())
}
