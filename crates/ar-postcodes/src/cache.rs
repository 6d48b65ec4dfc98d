use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::{
    error::{LoadError, ResolveError, SaveError},
    postcode::Postcode,
    record::LocationRecord,
};

/// Postcode to record mapping of every location resolved so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationCache {
    records: BTreeMap<Postcode, LocationRecord>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &Postcode) -> Option<&LocationRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &Postcode) -> bool {
        self.records.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Postcode, LocationRecord> {
        self.records.iter()
    }

    /// The distinct required codes that have no record yet.
    pub fn missing<I>(&self, required: I) -> BTreeSet<Postcode>
    where
        I: IntoIterator<Item = Postcode>,
    {
        required
            .into_iter()
            .filter(|code| !self.contains(code))
            .collect()
    }

    /// Index records by their normalized postcode. Existing entries for the same code are
    /// replaced, nothing is ever removed.
    pub fn extend<I>(&mut self, records: I) -> Result<(), ResolveError>
    where
        I: IntoIterator<Item = LocationRecord>,
    {
        for record in records {
            let code = record.postcode().ok_or(ResolveError::MissingPostcode)?;
            self.records.insert(code, record);
        }
        Ok(())
    }
}

impl IntoIterator for LocationCache {
    type Item = (Postcode, LocationRecord);
    type IntoIter = btree_map::IntoIter<Postcode, LocationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Handle on the file the cache is persisted to.
#[derive(Clone, Debug)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted cache. A file that does not exist yet is an empty cache.
    pub async fn load(&self) -> Result<LocationCache, LoadError> {
        let file_contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!(
                    "no location cache at {}, starting empty",
                    self.path.display()
                );
                return Ok(LocationCache::new());
            }
            Err(e) => return Err(e.into()),
        };
        let cache: LocationCache = serde_json::from_str(&file_contents)?;
        log::info!(
            "loaded {} cached locations from {}",
            cache.len(),
            self.path.display()
        );
        Ok(cache)
    }

    /// Replace the persisted cache with `cache`.
    ///
    /// The snapshot is written to a sibling file and renamed over the target once flushed,
    /// so the previous snapshot survives any failure.
    pub async fn save(&self, cache: &LocationCache) -> Result<(), SaveError> {
        let serialized = serde_json::to_vec(cache)?;
        let staging = self.staging_path();
        if let Err(e) = write_synced(&staging, &serialized).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        log::info!(
            "persisted {} locations to {}",
            cache.len(),
            self.path.display()
        );
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

async fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
