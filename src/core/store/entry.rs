use std::fmt;
use std::sync::Arc;

use sha1::{Digest, Sha1};

use crate::core::descriptor::Descriptor;
use crate::core::platform::BASELINE_TIER;

pub const CLASS_SUFFIX: &str = ".class";

/// One logical resource as ingested from a sub-archive.
///
/// Entries are immutable once built. Jar-local and global copies of the same
/// resource share one byte buffer.
#[derive(Clone)]
pub struct CachedEntry {
    /// Store key, e.g. `com/foo/Bar.class` or `lib/util.jar/data.txt`.
    pub logical_name: String,
    /// Path exactly as stored inside its sub-archive.
    pub origin_name: String,
    pub bytes: Arc<[u8]>,
    /// Sub-archive the bytes came from (`/` for the container itself).
    pub origin: String,
    pub descriptor: Option<Arc<Descriptor>>,
    pub version_tier: u32,
}

impl CachedEntry {
    pub fn new(
        logical_name: impl Into<String>,
        origin_name: impl Into<String>,
        bytes: Arc<[u8]>,
        origin: impl Into<String>,
        descriptor: Option<Arc<Descriptor>>,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            origin_name: origin_name.into(),
            bytes,
            origin: origin.into(),
            descriptor,
            version_tier: BASELINE_TIER,
        }
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.version_tier = tier;
        self
    }

    /// Same bytes and origin under another key.
    pub fn renamed(&self, logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            ..self.clone()
        }
    }

    pub fn is_class(&self) -> bool {
        self.logical_name.ends_with(CLASS_SUFFIX)
    }
}

impl fmt::Debug for CachedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedEntry")
            .field("logical_name", &self.logical_name)
            .field("origin_name", &self.origin_name)
            .field("origin", &self.origin)
            .field("len", &self.bytes.len())
            .field("version_tier", &self.version_tier)
            .finish()
    }
}

/// Store key for a dotted class name (`com.x.Main` -> `com/x/Main.class`).
pub fn class_entry_name(class_name: &str) -> String {
    format!("{}{}", class_name.replace('.', "/"), CLASS_SUFFIX)
}

/// Short SHA-1 fingerprint used in shadowing diagnostics.
pub fn digest_hex(bytes: &[u8]) -> String {
    let digest = Sha1::digest(bytes);
    hex::encode(&digest[..6])
}
