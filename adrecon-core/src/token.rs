//! Persistent per-network authentication tokens.
//!
//! One JSON file per network under a caller-supplied directory, fronted by
//! an in-memory cache so a token refreshed mid-run is observed by every
//! later fetch without touching disk. Disk writes go through a sibling temp
//! file and an atomic rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use moka::Expiry;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use adrecon_types::{AdreconError, Network};

const TOKEN_FILE_SUFFIX: &str = "_token.json";

/// Seconds subtracted from a provider-reported lifetime so a token is never
/// presented moments before the provider rejects it.
pub const EXPIRY_BUFFER_SECS: u64 = 60;

/// A cached authentication credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The credential itself.
    pub token: String,
    /// Scheme, usually `Bearer`.
    pub token_type: String,
    /// Absolute expiry, seconds since the Unix epoch.
    pub expires_at: u64,
    /// Write time, seconds since the Unix epoch.
    pub created_at: u64,
    /// Network key this record belongs to.
    pub network: String,
    /// Provider-specific extras (refresh token, scope, session ids);
    /// round-tripped untouched.
    #[serde(flatten)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl TokenRecord {
    /// Whether the record's expiry lies in the past.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_epoch()
    }

    /// Remaining lifetime, `None` when already expired.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let now = now_epoch();
        (self.expires_at > now).then(|| Duration::from_secs(self.expires_at - now))
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct RecordExpiry;

impl Expiry<Network, TokenRecord> for RecordExpiry {
    fn expire_after_create(
        &self,
        _key: &Network,
        value: &TokenRecord,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        // An already-expired record evicts immediately.
        Some(value.remaining().unwrap_or(Duration::ZERO))
    }
}

/// File-backed token store with an in-memory front.
///
/// Expired records are treated as absent and purged on read. Missing keys
/// are never errors; only permission-class I/O failures surface.
#[derive(Debug)]
pub struct TokenCache {
    dir: PathBuf,
    memory: Cache<Network, TokenRecord>,
}

impl TokenCache {
    /// Open a cache rooted at `dir`. The directory is created lazily on the
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            memory: Cache::builder()
                .max_capacity(64)
                .expire_after(RecordExpiry)
                .build(),
        }
    }

    fn file_for(&self, network: Network) -> PathBuf {
        self.dir.join(format!("{}{}", network.key(), TOKEN_FILE_SUFFIX))
    }

    /// Fetch a valid record for `network`, or `None`.
    ///
    /// # Errors
    /// Only on I/O failures other than a missing file; corrupt or expired
    /// files are purged and reported as absent.
    pub async fn get(&self, network: Network) -> Result<Option<TokenRecord>, AdreconError> {
        if let Some(record) = self.memory.get(&network).await {
            if !record.is_expired() {
                return Ok(Some(record));
            }
            self.memory.invalidate(&network).await;
        }

        let path = self.file_for(network);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%network, "no cached token");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record: TokenRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(%network, error = %e, "corrupt token file, purging");
                self.delete(network).await?;
                return Ok(None);
            }
        };

        if record.is_expired() {
            info!(%network, "cached token expired, purging");
            self.delete(network).await?;
            return Ok(None);
        }

        self.memory.insert(network, record.clone()).await;
        Ok(Some(record))
    }

    /// Persist a fresh token. The stored expiry is
    /// `now + max(expires_in - 60s, 60s)` to absorb clock skew and slow
    /// callers.
    ///
    /// # Errors
    /// On directory-creation or write failures.
    pub async fn put(
        &self,
        network: Network,
        token: &str,
        expires_in: u64,
        token_type: &str,
        extras: BTreeMap<String, serde_json::Value>,
    ) -> Result<TokenRecord, AdreconError> {
        let effective = expires_in.saturating_sub(EXPIRY_BUFFER_SECS).max(EXPIRY_BUFFER_SECS);
        let now = now_epoch();
        let record = TokenRecord {
            token: token.to_string(),
            token_type: token_type.to_string(),
            expires_at: now + effective,
            created_at: now,
            network: network.key().to_string(),
            extras,
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_for(network);
        write_atomic(&path, &serde_json::to_vec_pretty(&record).map_err(|e| {
            AdreconError::config(format!("token record serialization failed: {e}"))
        })?)
        .await?;

        self.memory.insert(network, record.clone()).await;
        info!(%network, expires_in = effective, "cached token");
        Ok(record)
    }

    /// Drop the record for `network` from memory and disk.
    ///
    /// # Errors
    /// On I/O failures other than a missing file.
    pub async fn delete(&self, network: Network) -> Result<(), AdreconError> {
        self.memory.invalidate(&network).await;
        match tokio::fs::remove_file(self.file_for(network)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every token file in the cache directory. Returns how many
    /// were removed.
    ///
    /// # Errors
    /// On directory read failures (a missing directory counts as empty).
    pub async fn clear_all(&self) -> Result<usize, AdreconError> {
        self.memory.invalidate_all();
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(TOKEN_FILE_SUFFIX)
                && tokio::fs::remove_file(entry.path()).await.is_ok()
            {
                removed += 1;
            }
        }
        info!(removed, "cleared token cache");
        Ok(removed)
    }

    /// Network keys with a token file on disk (valid or not).
    ///
    /// # Errors
    /// On directory read failures (a missing directory counts as empty).
    pub async fn list(&self) -> Result<Vec<String>, AdreconError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(TOKEN_FILE_SUFFIX) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AdreconError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
