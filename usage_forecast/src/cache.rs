//! Fitted model cache
//!
//! Models are stored as bytes keyed by (metric, series key). The cache only
//! knows how to (de)serialize models; where the bytes live is up to the
//! injected [`BlobStore`].

use crate::error::{ForecastError, Result};
use crate::models::seasonal_trend::FittedSeasonalTrend;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Byte storage for serialized models
pub trait BlobStore: Send + Sync {
    /// Blob stored for `(metric, key)`, or `None` if there is none
    fn load(&self, metric: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Drop every blob of `metric`, then store `blobs`
    fn replace_all(&self, metric: &str, blobs: Vec<(String, Vec<u8>)>) -> Result<()>;
}

/// In-process blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys stored for `metric`
    pub fn keys(&self, metric: &str) -> Vec<String> {
        self.blobs
            .read()
            .get(metric)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, metric: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .get(metric)
            .and_then(|m| m.get(key))
            .cloned())
    }

    fn replace_all(&self, metric: &str, blobs: Vec<(String, Vec<u8>)>) -> Result<()> {
        let fresh: BTreeMap<String, Vec<u8>> = blobs.into_iter().collect();
        self.blobs.write().insert(metric.to_string(), fresh);
        Ok(())
    }
}

/// Blob store writing one file per model under `root/<metric>/`
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metric_dir(&self, metric: &str) -> PathBuf {
        self.root.join(encode_component(metric))
    }

    fn blob_path(&self, metric: &str, key: &str) -> PathBuf {
        self.metric_dir(metric)
            .join(format!("{}.json", encode_component(key)))
    }
}

fn store_error(path: &Path, err: std::io::Error) -> ForecastError {
    ForecastError::CacheStore(format!("{}: {}", path.display(), err))
}

/// Percent-encode everything outside `[A-Za-z0-9._-]`, and a leading `.`, so any
/// key is a safe file name
fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => encoded.push(byte as char),
            b'.' if !encoded.is_empty() => encoded.push('.'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

impl BlobStore for DirectoryBlobStore {
    fn load(&self, metric: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(metric, key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(store_error(&path, err)),
        }
    }

    fn replace_all(&self, metric: &str, blobs: Vec<(String, Vec<u8>)>) -> Result<()> {
        let dir = self.metric_dir(metric);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(store_error(&dir, err)),
        }
        fs::create_dir_all(&dir).map_err(|e| store_error(&dir, e))?;

        for (key, bytes) in blobs {
            let path = self.blob_path(metric, &key);
            fs::write(&path, bytes).map_err(|e| store_error(&path, e))?;
        }
        Ok(())
    }
}

/// Typed cache of fitted models over a blob store
#[derive(Debug)]
pub struct ModelCache<S: BlobStore> {
    store: S,
}

impl<S: BlobStore> ModelCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cached model for `(metric, key)`. A miss is `Ok(None)`.
    pub fn get(&self, metric: &str, key: &str) -> Result<Option<FittedSeasonalTrend>> {
        match self.store.load(metric, key)? {
            Some(bytes) => {
                debug!(metric, series_key = key, bytes = bytes.len(), "cache hit");
                Ok(Some(FittedSeasonalTrend::from_bytes(&bytes)?))
            }
            None => {
                debug!(metric, series_key = key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Replace every cached model of `metric` with `models`
    pub fn put_batch(&self, metric: &str, models: &[(String, FittedSeasonalTrend)]) -> Result<()> {
        let blobs = models
            .iter()
            .map(|(key, model)| Ok((key.clone(), model.to_bytes()?)))
            .collect::<Result<Vec<_>>>()?;
        self.store.replace_all(metric, blobs)?;
        info!(metric, models = models.len(), "replaced cached models");
        Ok(())
    }
}
