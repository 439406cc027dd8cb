//! Network bridge the cache uses to (re)download icon bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Error;

/// Raw bytes returned by an icon fetch.
#[derive(Debug, Clone)]
pub struct FetchedIcon {
    /// URL the bytes were served from.
    pub url: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Downloads icon bytes for a URL.
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch_icon(&self, url: &str) -> Result<FetchedIcon, Error>;
}
