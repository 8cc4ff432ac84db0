// ─── Native Library Materializer ───
// Native loaders need a real path, so the few native entries that are asked
// for are copied out to temp files, once each.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use super::strategy::{NativePathStrategy, BINLIB_PREFIX};
use crate::core::error::{LoaderError, LoaderResult};
use crate::core::platform::Platform;
use crate::core::store::{CachedEntry, EntryStore};

#[derive(Debug)]
pub struct NativeLibraryMaterializer {
    strategy: Arc<dyn NativePathStrategy>,
    /// Directory for extracted files; the system temp dir when unset.
    expand_dir: Option<PathBuf>,
    /// Storage path -> extracted file. Dropping the materializer deletes them.
    extracted: Mutex<HashMap<String, TempPath>>,
}

impl NativeLibraryMaterializer {
    pub fn new(strategy: Arc<dyn NativePathStrategy>, expand_dir: Option<PathBuf>) -> Self {
        Self {
            strategy,
            expand_dir,
            extracted: Mutex::new(HashMap::new()),
        }
    }

    /// Filesystem path for native library `name`, extracting it on first use.
    ///
    /// `None` sends the caller to the host's own library search path.
    pub fn find(&self, name: &str, store: &EntryStore, platform: &Platform) -> Option<PathBuf> {
        let file_name = platform.map_library_name(name);
        let preferred = self.strategy.prefix(platform);

        let mut candidates = Vec::with_capacity(2);
        if let Some(prefix) = preferred {
            candidates.push(format!("{prefix}{file_name}"));
        }
        let neutral = format!("{BINLIB_PREFIX}{file_name}");
        if !candidates.contains(&neutral) {
            candidates.push(neutral);
        }

        for storage_path in &candidates {
            if let Some(path) = self.materialize(storage_path, store) {
                return Some(path);
            }
        }
        debug!("native library {} not bundled (tried {:?})", name, candidates);
        None
    }

    fn materialize(&self, storage_path: &str, store: &EntryStore) -> Option<PathBuf> {
        // One lock over lookup and extraction keeps extraction at most once
        // per storage path.
        let mut extracted = self.extracted.lock();
        if let Some(path) = extracted.get(storage_path) {
            return Some(path.to_path_buf());
        }

        let entry = store.get(storage_path)?;
        match self.extract(&entry) {
            Ok(temp) => {
                let path = temp.to_path_buf();
                info!("extracted native library {} to {:?}", storage_path, path);
                extracted.insert(storage_path.to_string(), temp);
                Some(path)
            }
            Err(err) => {
                warn!("Unable to extract native library {}: {}", storage_path, err);
                None
            }
        }
    }

    fn extract(&self, entry: &CachedEntry) -> LoaderResult<TempPath> {
        let file_name = entry
            .logical_name
            .rsplit('/')
            .next()
            .unwrap_or(entry.logical_name.as_str());
        let (stem, suffix) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (file_name, String::new()),
        };

        let mut builder = tempfile::Builder::new();
        let prefix = format!("{stem}-");
        builder.prefix(&prefix).suffix(&suffix);

        let mut file = match &self.expand_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|source| LoaderError::io(dir, source))?;
                builder
                    .tempfile_in(dir)
                    .map_err(|source| LoaderError::io(dir, source))?
            }
            None => builder
                .tempfile()
                .map_err(|source| LoaderError::io(std::env::temp_dir(), source))?,
        };

        if let Err(source) = file.write_all(&entry.bytes) {
            return Err(LoaderError::io(file.path(), source));
        }
        Ok(file.into_temp_path())
    }

    /// Number of libraries extracted so far.
    pub fn extracted_count(&self) -> usize {
        self.extracted.lock().len()
    }
}
