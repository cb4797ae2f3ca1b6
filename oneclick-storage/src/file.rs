//! Directory-backed local cache
//!
//! Persists each cache entry as one JSON file so cached rules survive
//! restarts of the host process.

use std::path::{Path, PathBuf};

use crate::{LocalCache, StorageError};

/// File cache configuration
#[derive(Debug, Clone)]
pub struct FileCacheConfig {
    pub directory: PathBuf,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./cache"),
        }
    }
}

/// Local cache storing one file per key
pub struct FileLocalCache {
    directory: PathBuf,
}

impl FileLocalCache {
    /// Create the cache, creating its directory if needed
    pub fn new(config: FileCacheConfig) -> Result<Self, StorageError> {
        if !config.directory.exists() {
            std::fs::create_dir_all(&config.directory)?;
        }
        tracing::info!("Using local rule cache at {:?}", config.directory);
        Ok(Self {
            directory: config.directory,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", encode_key(key)))
    }
}

/// Map a cache key onto a safe file name
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("_{:02x}", b));
        }
    }
    encoded
}

impl LocalCache for FileLocalCache {
    fn read(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read cache entry {:?}: {}", path, e);
                None
            }
        }
    }

    fn write(&self, key: &str, json: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_keeps_keys_distinct() {
        assert_eq!(encode_key("proj-1/bug"), "proj-1_2fbug");
        assert_ne!(encode_key("a/b_c"), encode_key("a_b/c"));
    }

    #[test]
    fn test_write_then_read_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileCacheConfig {
            directory: dir.path().join("rules"),
        };

        let cache = FileLocalCache::new(config.clone()).unwrap();
        assert!(cache.read("proj-1/user story").is_none());
        cache.write("proj-1/user story", r#"{"cacheStamp":3}"#).unwrap();
        cache.write("proj-1/user story", r#"{"cacheStamp":4}"#).unwrap();

        let reopened = FileLocalCache::new(config).unwrap();
        assert_eq!(
            reopened.read("proj-1/user story").as_deref(),
            Some(r#"{"cacheStamp":4}"#)
        );
    }
}
