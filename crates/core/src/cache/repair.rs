//! Startup integrity scan.
//!
//! A single corrupt row wipes the whole table. Rows are not repaired one by
//! one.

use super::connection::CacheDb;
use super::entries::{SELECT_COLUMNS, StoredEntry};
use crate::Error;
use tokio_rusqlite::rusqlite::types::Value;

/// Outcome of a corruption scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub scanned: u64,
    pub corrupt: u64,
    pub cleared: bool,
}

impl CacheDb {
    /// Validate every persisted entry and clear the table if any is corrupt.
    pub async fn repair_corruption(&self) -> Result<RepairReport, Error> {
        self.conn
            .call(|conn| -> Result<RepairReport, Error> {
                let mut report = RepairReport::default();
                {
                    let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM icon_entries"))?;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        report.scanned += 1;
                        let entry = StoredEntry::from_row(row)?;
                        if let Err(reason) = entry.check_structure() {
                            let key = match &entry.cache_key {
                                Value::Text(k) => k.clone(),
                                other => format!("{other:?}"),
                            };
                            tracing::warn!(cache_key = %key, %reason, "corrupt icon cache entry");
                            report.corrupt += 1;
                        }
                    }
                }

                if report.corrupt > 0 {
                    conn.execute("DELETE FROM icon_entries", [])?;
                    report.cleared = true;
                }

                Ok(report)
            })
            .await
            .map_err(Error::from)
    }
}
