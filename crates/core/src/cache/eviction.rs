//! LRU eviction by last access time.
//!
//! Bounds are targets, not hard limits: writes may overshoot them until the
//! next pass, and a single pass removes at most one batch.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Total persisted bytes the cache aims to stay under (20 MiB).
pub const MAX_TOTAL_SIZE: u64 = 20 * 1024 * 1024;

/// Entry count the cache aims to stay under.
pub const MAX_ENTRIES: u64 = 1000;

/// Largest blob a single write accepts (500 KiB).
pub const MAX_SINGLE_SIZE: usize = 500 * 1024;

/// Most entries removed by one eviction pass.
pub const EVICTION_BATCH: usize = 50;

/// Size and count bounds applied by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_total_size: u64,
    pub max_entries: u64,
    pub max_single_size: usize,
    pub eviction_batch: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_total_size: MAX_TOTAL_SIZE,
            max_entries: MAX_ENTRIES,
            max_single_size: MAX_SINGLE_SIZE,
            eviction_batch: EVICTION_BATCH,
        }
    }
}

impl CacheLimits {
    fn within(&self, total_size: i64, count: i64) -> bool {
        total_size <= self.max_total_size as i64 && count <= self.max_entries as i64
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: u64,
    pub freed_bytes: u64,
}

impl CacheDb {
    /// Run one eviction pass against `limits`.
    ///
    /// Walks entries oldest-accessed first, collecting victims until both
    /// bounds hold or the batch cap is hit, then deletes them in a single
    /// transaction.
    pub async fn evict_lru(&self, limits: &CacheLimits) -> Result<EvictionReport, Error> {
        let limits = *limits;
        self.conn
            .call(move |conn| -> Result<EvictionReport, Error> {
                let (mut total, mut count): (i64, i64) = conn.query_row(
                    "SELECT COALESCE(SUM(size), 0), COUNT(*) FROM icon_entries",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                if limits.within(total, count) {
                    return Ok(EvictionReport::default());
                }

                let mut victims: Vec<i64> = Vec::new();
                let mut freed: i64 = 0;
                {
                    let mut stmt = conn.prepare(
                        "SELECT rowid, size FROM icon_entries ORDER BY last_accessed_at ASC, rowid ASC",
                    )?;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        if limits.within(total, count) || victims.len() >= limits.eviction_batch {
                            break;
                        }
                        let rowid: i64 = row.get(0)?;
                        let size = row.get::<_, Option<i64>>(1).ok().flatten().unwrap_or(0);
                        victims.push(rowid);
                        total -= size;
                        count -= 1;
                        freed += size;
                    }
                }

                let tx = conn.transaction()?;
                for rowid in &victims {
                    tx.execute("DELETE FROM icon_entries WHERE rowid = ?1", params![rowid])?;
                }
                tx.commit()?;

                Ok(EvictionReport { evicted: victims.len() as u64, freed_bytes: freed.max(0) as u64 })
            })
            .await
            .map_err(Error::from)
    }
}
