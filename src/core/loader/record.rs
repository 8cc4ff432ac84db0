use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, warn};

use super::locator::ROOT_ORIGIN;
use crate::core::store::CachedEntry;

pub const DEFAULT_RECORDING_DIR: &str = "recording";

/// Writes the bytes of every defined class below a recording directory,
/// one sub-directory per origin unless flattened.
#[derive(Debug, Clone)]
pub struct ClassRecorder {
    dir: PathBuf,
    flatten: bool,
}

impl ClassRecorder {
    pub fn new(dir: impl Into<PathBuf>, flatten: bool) -> Self {
        Self {
            dir: dir.into(),
            flatten,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `entry` is recorded; `None` when its names would land outside
    /// the recording directory.
    pub fn target_for(&self, entry: &CachedEntry) -> Option<PathBuf> {
        if !is_relative_below(&entry.origin_name) {
            return None;
        }
        let base = if self.flatten || entry.origin == ROOT_ORIGIN {
            self.dir.clone()
        } else if is_relative_below(&entry.origin) {
            self.dir.join(&entry.origin)
        } else {
            return None;
        };
        Some(base.join(&entry.origin_name))
    }

    /// Record `entry` unless it is already on disk. Failures are logged only.
    pub fn record(&self, entry: &CachedEntry) {
        let Some(file) = self.target_for(entry) else {
            warn!(
                "not recording {} from {}: name escapes {:?}",
                entry.origin_name, entry.origin, self.dir
            );
            return;
        };
        if file.exists() {
            return;
        }

        if let Some(parent) = file.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                error!("unable to record {:?}: {}", file, err);
                return;
            }
        }

        match std::fs::write(&file, &entry.bytes[..]) {
            Ok(()) => debug!("recorded {:?}", file),
            Err(err) => error!("unable to record {:?}: {}", file, err),
        }
    }
}

fn is_relative_below(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
