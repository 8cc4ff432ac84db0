use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::entry::{digest_hex, CachedEntry};

#[derive(Debug, Default)]
struct KnownOrigins {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

/// In-memory mapping from logical name to cached bytes.
///
/// Writes only happen during ingestion; afterwards the store is read-only and
/// shared between lookup threads.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: RwLock<HashMap<String, Arc<CachedEntry>>>,
    origins: RwLock<KnownOrigins>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` under its logical name.
    ///
    /// With `first_wins` an existing entry is kept and the newcomer is
    /// reported as shadowed. Returns whether the entry was stored.
    pub fn put(&self, entry: CachedEntry, first_wins: bool) -> bool {
        let mut entries = self.entries.write();
        if first_wins {
            if let Some(existing) = entries.get(&entry.logical_name) {
                report_shadowed(existing, &entry);
                return false;
            }
        }
        entries.insert(entry.logical_name.clone(), Arc::new(entry));
        true
    }

    /// Install a version-tiered override.
    ///
    /// The entry replaces what is stored only when its tier is strictly
    /// higher than the stored tier and does not exceed `platform_tier`.
    pub fn put_versioned(&self, entry: CachedEntry, platform_tier: u32) -> bool {
        if entry.version_tier > platform_tier {
            debug!(
                "ignoring {} (tier {}) above platform tier {}",
                entry.origin_name, entry.version_tier, platform_tier
            );
            return false;
        }

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&entry.logical_name) {
            if entry.version_tier <= existing.version_tier {
                debug!(
                    "keeping {} at tier {} over tier {}",
                    existing.logical_name, existing.version_tier, entry.version_tier
                );
                return false;
            }
        }
        debug!(
            "versioned override {} -> {} (tier {})",
            entry.origin_name, entry.logical_name, entry.version_tier
        );
        entries.insert(entry.logical_name.clone(), Arc::new(entry));
        true
    }

    pub fn get(&self, logical_name: &str) -> Option<Arc<CachedEntry>> {
        self.entries.read().get(logical_name).cloned()
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.entries.read().contains_key(logical_name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn record_origin(&self, origin: &str) {
        let mut origins = self.origins.write();
        if origins.seen.insert(origin.to_string()) {
            origins.ordered.push(origin.to_string());
        }
    }

    pub fn is_known_origin(&self, name: &str) -> bool {
        self.origins.read().seen.contains(name)
    }

    /// Sub-archives that contributed resources, in first-seen order.
    pub fn known_origins(&self) -> Vec<String> {
        self.origins.read().ordered.clone()
    }
}

fn report_shadowed(existing: &CachedEntry, newcomer: &CachedEntry) {
    let name = &existing.logical_name;
    if existing.bytes[..] == newcomer.bytes[..] || name.starts_with("META-INF") {
        debug!(
            "{} in {} is hidden by {} (same bytes)",
            name, newcomer.origin, existing.origin
        );
    } else if existing.is_class() {
        warn!(
            "{} in {} is hidden by {} (different bytecode {} vs {})",
            name,
            newcomer.origin,
            existing.origin,
            digest_hex(&newcomer.bytes),
            digest_hex(&existing.bytes)
        );
    } else {
        info!(
            "{} in {} is hidden by {} (different bytes)",
            name, newcomer.origin, existing.origin
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use parking_lot::Mutex;

    use super::*;

    fn entry(name: &str, bytes: &[u8], origin: &str) -> CachedEntry {
        CachedEntry::new(name, name, Arc::from(bytes), origin, None)
    }

    /// Log sink shared with a scoped subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Levels of the shadowing events emitted while `f` runs.
    fn shadowing_levels(f: impl FnOnce()) -> Vec<String> {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let text = String::from_utf8(captured.0.lock().clone()).unwrap();
        text.lines()
            .filter(|line| line.contains(" is hidden by "))
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn differing_class_bytes_warn_once() {
        let store = EntryStore::new();
        store.put(entry("com/a/B.class", b"one", "lib/1.jar"), true);
        let levels = shadowing_levels(|| {
            store.put(entry("com/a/B.class", b"two", "lib/2.jar"), true);
        });
        assert_eq!(levels, vec!["WARN"]);
    }

    #[test]
    fn differing_resources_are_reported_at_info() {
        let store = EntryStore::new();
        store.put(entry("conf/app.properties", b"one", "lib/1.jar"), true);
        let levels = shadowing_levels(|| {
            store.put(entry("conf/app.properties", b"two", "lib/2.jar"), true);
        });
        assert_eq!(levels, vec!["INFO"]);
    }

    #[test]
    fn identical_or_descriptor_shadowing_stays_at_debug() {
        let store = EntryStore::new();
        store.put(entry("com/a/B.class", b"same", "lib/1.jar"), true);
        store.put(entry("META-INF/LICENSE", b"one", "lib/1.jar"), true);
        let levels = shadowing_levels(|| {
            store.put(entry("com/a/B.class", b"same", "lib/2.jar"), true);
            store.put(entry("META-INF/LICENSE", b"two", "lib/2.jar"), true);
        });
        assert_eq!(levels, vec!["DEBUG", "DEBUG"]);
    }

    #[test]
    fn first_insert_wins() {
        let store = EntryStore::new();
        assert!(store.put(entry("com/a/B.class", b"one", "lib/1.jar"), true));
        assert!(!store.put(entry("com/a/B.class", b"two", "lib/2.jar"), true));

        let kept = store.get("com/a/B.class").unwrap();
        assert_eq!(&kept.bytes[..], b"one");
        assert_eq!(kept.origin, "lib/1.jar");
    }

    #[test]
    fn identical_bytes_are_shadowed_quietly() {
        let store = EntryStore::new();
        assert!(store.put(entry("com/a/B.class", b"same", "lib/1.jar"), true));
        assert!(!store.put(entry("com/a/B.class", b"same", "lib/2.jar"), true));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_without_first_wins_overwrites() {
        let store = EntryStore::new();
        store.put(entry("x", b"one", "/"), true);
        assert!(store.put(entry("x", b"two", "/"), false));
        assert_eq!(&store.get("x").unwrap().bytes[..], b"two");
    }

    #[test]
    fn versioned_override_requires_qualifying_platform() {
        let store = EntryStore::new();
        store.put(entry("x.txt", b"base", "lib/a.jar"), true);

        let v11 = entry("x.txt", b"eleven", "lib/a.jar").with_tier(11);
        assert!(!store.put_versioned(v11.clone(), 10));
        assert_eq!(&store.get("x.txt").unwrap().bytes[..], b"base");

        assert!(store.put_versioned(v11, 11));
        assert_eq!(&store.get("x.txt").unwrap().bytes[..], b"eleven");
    }

    #[test]
    fn lower_tier_after_higher_is_a_no_op() {
        let store = EntryStore::new();
        store.put(entry("x.txt", b"base", "lib/a.jar"), true);
        assert!(store.put_versioned(entry("x.txt", b"eleven", "lib/a.jar").with_tier(11), 17));
        assert!(!store.put_versioned(entry("x.txt", b"nine", "lib/a.jar").with_tier(9), 17));

        let stored = store.get("x.txt").unwrap();
        assert_eq!(&stored.bytes[..], b"eleven");
        assert_eq!(stored.version_tier, 11);
    }

    #[test]
    fn origins_are_reported_in_first_seen_order() {
        let store = EntryStore::new();
        store.record_origin("lib/b.jar");
        store.record_origin("lib/a.jar");
        store.record_origin("lib/b.jar");
        assert_eq!(store.known_origins(), vec!["lib/b.jar", "lib/a.jar"]);
        assert!(store.is_known_origin("lib/a.jar"));
        assert!(!store.is_known_origin("lib/c.jar"));
    }
}
