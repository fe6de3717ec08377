use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::CacheKey;
use crate::domain::CityDataBundle;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt cache blob at {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to encode bundle: {0}")]
    Encode(#[source] bincode::Error),
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Bundles stored as one bincode file per city
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open the store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read a bundle.
    ///
    /// # Returns
    /// * `Ok(None)` - Nothing stored under this key
    /// * `Err(CacheError::Corrupt)` - File exists but does not decode
    pub fn load(&self, key: &CacheKey) -> Result<Option<CityDataBundle>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        // Slice decoding checks every length prefix against the bytes left
        decode_bundle(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Corrupt { path, source })
    }

    /// Write a bundle atomically: readers see the old blob or the new one,
    /// never a partial file
    pub fn save(&self, key: &CacheKey, bundle: &CityDataBundle) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(
            "{}.tmp-{}-{}",
            key.file_name(),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let result = (|| {
            let file = fs::File::create(&tmp).map_err(|e| CacheError::io(&tmp, e))?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, bundle).map_err(CacheError::Encode)?;
            writer.flush().map_err(|e| CacheError::io(&tmp, e))?;
            fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /// Delete a stored bundle; missing files are not an error
    pub fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }
}

/// Encode a bundle for the shared store
pub fn encode_bundle(bundle: &CityDataBundle) -> Result<Vec<u8>, CacheError> {
    bincode::serialize(bundle).map_err(CacheError::Encode)
}

pub fn decode_bundle(bytes: &[u8]) -> Result<CityDataBundle, bincode::Error> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Building, FetchParams, GraphNode, RoadGraph};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn bundle() -> CityDataBundle {
        let graph = RoadGraph {
            nodes: vec![GraphNode {
                id: 1,
                lat: 48.7,
                lon: 44.5,
                street_count: 2,
            }],
            edges: Vec::new(),
        };
        let mut tags = HashMap::new();
        tags.insert("building".to_string(), "yes".to_string());
        let buildings = vec![Building::new(
            9,
            tags,
            vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)],
        )];
        CityDataBundle::new("Volgograd, Russia", FetchParams::default(), graph, buildings, vec![])
    }

    #[test]
    fn test_round_trip_keeps_stats_and_name() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = CacheKey::for_city("Volgograd, Russia");
        let original = bundle();

        store.save(&key, &original).unwrap();
        let loaded = store.load(&key).unwrap().unwrap();

        assert_eq!(loaded.city_name, original.city_name);
        assert_eq!(loaded.stats, original.stats);
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.load(&CacheKey::for_city("Nowhere")).unwrap().is_none());
        store.remove(&CacheKey::for_city("Nowhere")).unwrap();
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = CacheKey::for_city("Volgograd");
        fs::write(store.path_for(&key), b"not a bundle").unwrap();

        assert!(matches!(store.load(&key), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_huge_length_prefix_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = CacheKey::for_city("Volgograd");

        // empty nodes, edges, buildings and zones, then a 1 TiB city name
        let mut bytes = vec![0u8; 32];
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        bytes.extend_from_slice(b"Volgograd");
        fs::write(store.path_for(&key), &bytes).unwrap();

        assert!(matches!(store.load(&key), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path().join("nested")).unwrap();
        let key = CacheKey::for_city("Volgograd");
        store.save(&key, &bundle()).unwrap();
        store.save(&key, &bundle()).unwrap();

        let names: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["Volgograd.bin".to_string()]);
    }

    #[test]
    fn test_shared_encoding_round_trip() {
        let original = bundle();
        let bytes = encode_bundle(&original).unwrap();
        assert_eq!(decode_bundle(&bytes).unwrap(), original);
        assert!(decode_bundle(&bytes[..bytes.len() / 2]).is_err());
    }
}
