//! Small typed key-value settings store.
//!
//! The TTL preference lives here. Embedders that keep their settings
//! elsewhere implement [`SettingsStore`] themselves.

use super::connection::CacheDb;
use crate::Error;
use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;

/// Key-value settings repository.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a setting. Returns None if it was never written.
    async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, Error>;

    /// Write a setting, replacing any previous value.
    async fn put_setting(&self, key: &str, value: serde_json::Value) -> Result<(), Error>;
}

#[async_trait]
impl SettingsStore for CacheDb {
    async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, Error> {
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt = conn.prepare("SELECT value_json FROM settings WHERE key = ?1")?;

                match stmt.query_row(params![key], |row| row.get(0)) {
                    Ok(json) => Ok(Some(json)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    async fn put_setting(&self, key: &str, value: serde_json::Value) -> Result<(), Error> {
        let key = key.to_string();
        let value_json = serde_json::to_string(&value)?;
        let updated_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO settings (key, value_json, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![key, value_json, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
