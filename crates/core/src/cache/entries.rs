//! Icon entry CRUD operations.
//!
//! Rows are read back as raw SQLite values and decoded in Rust, so a row
//! written by an older build or damaged on disk surfaces as a [`Corruption`]
//! instead of a store error.

use super::connection::CacheDb;
use crate::Error;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use tokio_rusqlite::rusqlite::types::Value;

/// Smallest blob, in bytes, that can plausibly be an image.
pub const MIN_PLAUSIBLE_SIZE: usize = 32;

/// A cached icon as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub cache_key: String,
    pub blob: Bytes,
    pub source_url: String,
    /// Insertion or refresh time, ms since the Unix epoch.
    pub cached_at: i64,
    /// Last read time, ms since the Unix epoch.
    pub last_accessed_at: i64,
    pub size: u64,
}

/// Aggregate size of the persisted cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub total_size: u64,
    pub entry_count: u64,
}

/// Why a persisted row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Corruption {
    #[error("cache key missing, empty, or not text")]
    InvalidKey,

    #[error("blob cannot be reconstructed")]
    UnreadableBlob,

    #[error("blob is empty")]
    EmptyBlob,

    #[error("malformed record: {0}")]
    MalformedRecord(&'static str),

    #[error("stored size is zero")]
    ZeroSize,

    #[error("implausible blob of {0} bytes")]
    Implausible(usize),
}

/// Encodings a persisted blob may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobEncoding {
    /// Native SQLite BLOB.
    Native,
    /// Hex text, as written by external exporters.
    Hex,
    /// JSON array of byte values, e.g. `[137,80,78,71]`.
    ByteArray,
}

/// Rebuild blob bytes from whatever SQLite handed back.
pub fn reconstruct_blob(value: &Value) -> Option<(BlobEncoding, Vec<u8>)> {
    match value {
        Value::Blob(bytes) => Some((BlobEncoding::Native, bytes.clone())),
        Value::Text(text) => {
            let text = text.trim();
            if text.starts_with('[') {
                serde_json::from_str::<Vec<u8>>(text)
                    .ok()
                    .map(|bytes| (BlobEncoding::ByteArray, bytes))
            } else {
                hex::decode(text).ok().map(|bytes| (BlobEncoding::Hex, bytes))
            }
        }
        _ => None,
    }
}

/// A row exactly as persisted, before validation.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub cache_key: Value,
    pub blob: Value,
    pub source_url: Value,
    pub cached_at: Value,
    pub last_accessed_at: Value,
    pub size: Value,
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(*v),
        _ => None,
    }
}

impl StoredEntry {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cache_key: row.get(0)?,
            blob: row.get(1)?,
            source_url: row.get(2)?,
            cached_at: row.get(3)?,
            last_accessed_at: row.get(4)?,
            size: row.get(5)?,
        })
    }

    /// Structural check used by the startup scan.
    pub fn check_structure(&self) -> Result<(), Corruption> {
        match &self.cache_key {
            Value::Text(key) if !key.is_empty() => {}
            _ => return Err(Corruption::InvalidKey),
        }
        if as_integer(&self.size).is_none() {
            return Err(Corruption::MalformedRecord("size"));
        }
        match reconstruct_blob(&self.blob) {
            Some((_, bytes)) if !bytes.is_empty() => Ok(()),
            Some(_) => Err(Corruption::EmptyBlob),
            None => Err(Corruption::UnreadableBlob),
        }
    }

    /// Full validation used on read.
    ///
    /// Besides the structural check, rejects rows with a stored size of zero
    /// and blobs too small to be an image.
    pub fn into_entry(self) -> Result<CacheEntry, Corruption> {
        self.check_structure()?;

        if as_integer(&self.size) == Some(0) {
            return Err(Corruption::ZeroSize);
        }

        let (_, blob) = reconstruct_blob(&self.blob).ok_or(Corruption::UnreadableBlob)?;
        if blob.len() < MIN_PLAUSIBLE_SIZE {
            return Err(Corruption::Implausible(blob.len()));
        }

        let cache_key = match self.cache_key {
            Value::Text(key) => key,
            _ => return Err(Corruption::InvalidKey),
        };
        let source_url = match self.source_url {
            Value::Text(url) => url,
            _ => String::new(),
        };

        Ok(CacheEntry {
            cache_key,
            size: blob.len() as u64,
            blob: Bytes::from(blob),
            source_url,
            cached_at: as_integer(&self.cached_at).unwrap_or(0),
            last_accessed_at: as_integer(&self.last_accessed_at).unwrap_or(0),
        })
    }
}

pub(crate) const SELECT_COLUMNS: &str = "cache_key, blob, source_url, cached_at, last_accessed_at, size";

impl CacheDb {
    /// Insert or replace the entry for `key`.
    ///
    /// Uses UPSERT semantics: a new row is inserted if the key doesn't exist,
    /// otherwise every column is overwritten and both timestamps reset to `now_ms`.
    pub async fn put_entry(&self, key: &str, blob: &[u8], source_url: &str, now_ms: i64) -> Result<(), Error> {
        let key = key.to_string();
        let blob = blob.to_vec();
        let source_url = source_url.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO icon_entries (cache_key, blob, source_url, cached_at, last_accessed_at, size)
                    VALUES (?1, ?2, ?3, ?4, ?4, ?5)
                    ON CONFLICT(cache_key) DO UPDATE SET
                        blob = excluded.blob,
                        source_url = excluded.source_url,
                        cached_at = excluded.cached_at,
                        last_accessed_at = excluded.last_accessed_at,
                        size = excluded.size",
                    params![key, blob, source_url, now_ms, blob.len() as i64],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Load the raw row for `key`.
    ///
    /// Returns None if the key doesn't exist in the cache.
    pub async fn load_entry(&self, key: &str) -> Result<Option<StoredEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM icon_entries WHERE cache_key = ?1"))?;

                match stmt.query_row(params![key], StoredEntry::from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Stamp `last_accessed_at` for `key`. Returns whether a row was updated.
    pub async fn touch_entry(&self, key: &str, at_ms: i64) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE icon_entries SET last_accessed_at = ?2 WHERE cache_key = ?1",
                    params![key, at_ms],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `key`. Returns whether a row was removed.
    pub async fn delete_entry(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM icon_entries WHERE cache_key = ?1", params![key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM icon_entries", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Total persisted size and entry count.
    pub async fn entry_stats(&self) -> Result<CacheStats, Error> {
        self.conn
            .call(|conn| -> Result<CacheStats, Error> {
                let (total, count): (i64, i64) = conn.query_row(
                    "SELECT COALESCE(SUM(size), 0), COUNT(*) FROM icon_entries",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(CacheStats { total_size: total.max(0) as u64, entry_count: count as u64 })
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn stored(key: Value, blob: Value, size: Value) -> StoredEntry {
        StoredEntry {
            cache_key: key,
            blob,
            source_url: Value::Text(String::new()),
            cached_at: Value::Integer(1),
            last_accessed_at: Value::Integer(1),
            size,
        }
    }

    #[tokio::test]
    async fn test_put_and_load() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let blob = icon_bytes(64);

        db.put_entry("k1", &blob, "https://example.com/favicon.ico", 1_000)
            .await
            .unwrap();

        let entry = db.load_entry("k1").await.unwrap().unwrap().into_entry().unwrap();
        assert_eq!(entry.blob.as_ref(), blob.as_slice());
        assert_eq!(entry.size, 64);
        assert_eq!(entry.source_url, "https://example.com/favicon.ico");
        assert_eq!(entry.cached_at, 1_000);
        assert_eq!(entry.last_accessed_at, 1_000);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.load_entry("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("k1", &icon_bytes(40), "a", 1).await.unwrap();
        db.put_entry("k1", &icon_bytes(80), "b", 2).await.unwrap();

        let entry = db.load_entry("k1").await.unwrap().unwrap().into_entry().unwrap();
        assert_eq!(entry.size, 80);
        assert_eq!(entry.source_url, "b");
        assert_eq!(db.entry_stats().await.unwrap(), CacheStats { total_size: 80, entry_count: 1 });
    }

    #[tokio::test]
    async fn test_touch_and_delete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("k1", &icon_bytes(40), "", 1).await.unwrap();

        assert!(db.touch_entry("k1", 99).await.unwrap());
        assert!(!db.touch_entry("missing", 99).await.unwrap());
        let entry = db.load_entry("k1").await.unwrap().unwrap().into_entry().unwrap();
        assert_eq!(entry.last_accessed_at, 99);
        assert_eq!(entry.cached_at, 1);

        assert!(db.delete_entry("k1").await.unwrap());
        assert!(!db.delete_entry("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("a", &icon_bytes(100), "", 1).await.unwrap();
        db.put_entry("b", &icon_bytes(50), "", 1).await.unwrap();
        assert_eq!(db.entry_stats().await.unwrap(), CacheStats { total_size: 150, entry_count: 2 });

        assert_eq!(db.clear_entries().await.unwrap(), 2);
        assert_eq!(db.entry_stats().await.unwrap(), CacheStats::default());
    }

    #[test]
    fn test_reconstruct_encodings() {
        let bytes = vec![137u8, 80, 78, 71];
        assert_eq!(reconstruct_blob(&Value::Blob(bytes.clone())), Some((BlobEncoding::Native, bytes.clone())));
        assert_eq!(reconstruct_blob(&Value::Text("89504e47".into())), Some((BlobEncoding::Hex, bytes.clone())));
        assert_eq!(
            reconstruct_blob(&Value::Text("[137, 80, 78, 71]".into())),
            Some((BlobEncoding::ByteArray, bytes))
        );
        assert_eq!(reconstruct_blob(&Value::Text("not hex".into())), None);
        assert_eq!(reconstruct_blob(&Value::Integer(5)), None);
        assert_eq!(reconstruct_blob(&Value::Null), None);
    }

    #[test]
    fn test_into_entry_rejections() {
        let good = Value::Blob(icon_bytes(64));

        let bad_key = stored(Value::Text(String::new()), good.clone(), Value::Integer(64));
        assert_eq!(bad_key.into_entry(), Err(Corruption::InvalidKey));

        let null_key = stored(Value::Null, good.clone(), Value::Integer(64));
        assert_eq!(null_key.check_structure(), Err(Corruption::InvalidKey));

        let zero = stored(Value::Text("k".into()), good.clone(), Value::Integer(0));
        assert!(zero.check_structure().is_ok());
        assert_eq!(zero.into_entry(), Err(Corruption::ZeroSize));

        let tiny = stored(Value::Text("k".into()), Value::Blob(icon_bytes(10)), Value::Integer(10));
        assert_eq!(tiny.into_entry(), Err(Corruption::Implausible(10)));

        let unreadable = stored(Value::Text("k".into()), Value::Real(1.5), Value::Integer(64));
        assert_eq!(unreadable.into_entry(), Err(Corruption::UnreadableBlob));

        let malformed = stored(Value::Text("k".into()), good, Value::Text("64".into()));
        assert_eq!(malformed.check_structure(), Err(Corruption::MalformedRecord("size")));
    }

    #[test]
    fn test_hex_blob_decodes_to_entry() {
        let hex_blob = Value::Text(hex::encode(icon_bytes(40)));
        let entry = stored(Value::Text("k".into()), hex_blob, Value::Integer(40))
            .into_entry()
            .unwrap();
        assert_eq!(entry.size, 40);
        assert_eq!(entry.blob.as_ref(), icon_bytes(40).as_slice());
    }
}
