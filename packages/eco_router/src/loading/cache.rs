//! File-backed memoisation for expensive external lookups (map downloads,
//! elevation batches). Each entry lives in its own JSON file named after the
//! dataset and a SHA-256 digest of the lookup parameters, so that identical
//! requests made by later processes are served from disk.
//!
//! The cache never fails loudly: any problem reading or writing an entry is
//! logged and treated as a miss, and the caller carries on uncached.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::common::error::CacheError;

/// Sort the keys of every object in the provided value, so that the
/// serialized form does not depend on the order the caller built it in
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, val)| (key, canonicalize(val)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(canonicalize).collect())
        }
        other => other,
    }
}

fn validate_dataset(dataset: &str) -> Result<(), CacheError> {
    let valid = !dataset.is_empty()
        && dataset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidDataset(dataset.to_string()))
    }
}

/// Content-addressed cache stored as a flat directory of JSON files
#[derive(Debug, Clone)]
pub struct ValueCache {
    dir: PathBuf,
}

impl ValueCache {
    /// Set up a cache in the provided directory, creating it if required.
    /// Failure to create the directory is not fatal; every lookup will simply
    /// miss
    pub fn new(dir: impl Into<PathBuf>) -> ValueCache {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(
                dir = %dir.display(),
                error = %err,
                "unable to create cache directory"
            );
        }
        ValueCache { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Digest of the canonical JSON form of the provided parameters
    pub fn cache_key<P: Serialize + ?Sized>(params: &P) -> Option<String> {
        match Self::try_cache_key(params) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(error = %err, "unable to serialize cache parameters");
                None
            }
        }
    }

    fn try_cache_key<P: Serialize + ?Sized>(
        params: &P,
    ) -> Result<String, CacheError> {
        let canonical = canonicalize(serde_json::to_value(params)?);
        let encoded = serde_json::to_vec(&canonical)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    fn entry_path<P: Serialize + ?Sized>(
        &self,
        dataset: &str,
        params: &P,
    ) -> Result<PathBuf, CacheError> {
        validate_dataset(dataset)?;
        let key = Self::try_cache_key(params)?;
        Ok(self.dir.join(format!("{dataset}_{key}.json")))
    }

    /// Retrieve a previously stored value. Returns None on a miss, and on any
    /// failure to read or decode the entry
    pub fn lookup<P, V>(&self, dataset: &str, params: &P) -> Option<V>
    where
        P: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        match self.try_lookup(dataset, params) {
            Ok(Some(value)) => {
                info!(dataset, "retrieved data from cache");
                Some(value)
            }
            Ok(None) => {
                debug!(dataset, "cache miss");
                None
            }
            Err(err) => {
                warn!(dataset, error = %err, "error reading cache entry");
                None
            }
        }
    }

    fn try_lookup<P, V>(
        &self,
        dataset: &str,
        params: &P,
    ) -> Result<Option<V>, CacheError>
    where
        P: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let path = self.entry_path(dataset, params)?;
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path)?);
        let value = serde_json::from_reader(reader)?;
        Ok(Some(value))
    }

    /// Persist a value against the provided parameters. The entry is written
    /// to a temporary file and moved into place, so readers never observe a
    /// partially written entry. Returns false if the value could not be
    /// stored
    pub fn store<P, V>(&self, dataset: &str, params: &P, value: &V) -> bool
    where
        P: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        match self.try_store(dataset, params, value) {
            Ok(path) => {
                info!(dataset, path = %path.display(), "saved data to cache");
                true
            }
            Err(err) => {
                warn!(dataset, error = %err, "error saving to cache");
                false
            }
        }
    }

    fn try_store<P, V>(
        &self,
        dataset: &str,
        params: &P,
        value: &V,
    ) -> Result<PathBuf, CacheError>
    where
        P: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let path = self.entry_path(dataset, params)?;

        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;

        Ok(path)
    }
}
