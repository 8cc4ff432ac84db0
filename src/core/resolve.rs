// ─── Resolver ───
// Maps a requested resource name onto an entry-store key:
// jar-local (caller's origin) first, then global.

use tracing::debug;

use crate::core::store::EntryStore;

/// Remove `.` and `..` segments from a `/`-separated path.
///
/// A `..` with nothing left to climb is kept as-is. Leading and trailing
/// separators survive.
pub fn canonicalize(path: &str) -> String {
    let (leading, body) = match path.strip_prefix('/') {
        Some(rest) => ("/", rest),
        None => ("", path),
    };

    let mut segments: Vec<&str> = Vec::new();
    let mut pieces = body.split('/').peekable();
    while let Some(segment) = pieces.next() {
        let is_last = pieces.peek().is_none();
        match segment {
            "." if !is_last => {}
            "." => segments.push(""),
            ".." => match segments.last() {
                Some(previous) if *previous != ".." => {
                    segments.pop();
                    if is_last {
                        segments.push("");
                    }
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    format!("{leading}{}", segments.join("/"))
}

pub struct Resolver<'a> {
    store: &'a EntryStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a EntryStore) -> Self {
        Self { store }
    }

    /// Resolve `requested` to a store key.
    ///
    /// `caller` is the logical name of the requesting class, when known; its
    /// origin is tried first (`origin/requested`), then the global key.
    pub fn resolve(&self, requested: &str, caller: Option<&str>) -> Option<String> {
        let canonical = canonicalize(requested);
        let name = canonical.strip_prefix('/').unwrap_or(&canonical);

        let caller_origin = caller
            .and_then(|caller| self.store.get(caller))
            .map(|entry| entry.origin.clone());

        if let Some(origin) = &caller_origin {
            let local = format!("{origin}/{name}");
            if self.store.contains(&local) {
                debug!("resource {} resolved to {} in codebase {}", name, local, origin);
                return Some(local);
            }
        }

        let resolved = self.store.contains(name).then(|| name.to_string());
        debug!(
            "resource {} resolved to {:?} ({})",
            name,
            resolved,
            caller_origin
                .as_deref()
                .map(|origin| format!("codebase {origin}"))
                .unwrap_or_else(|| "unknown codebase".to_string())
        );
        resolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::store::CachedEntry;

    fn put(store: &EntryStore, key: &str, origin: &str, bytes: &[u8]) {
        store.put(CachedEntry::new(key, key, Arc::from(bytes), origin, None), true);
    }

    #[test]
    fn canonicalize_removes_dot_segments() {
        assert_eq!(canonicalize("/a/./b/../c"), "/a/c");
        assert_eq!(canonicalize("a/b/c/../../d"), "a/d");
        assert_eq!(canonicalize("a/./b"), "a/b");
        assert_eq!(canonicalize("../x"), "../x");
        assert_eq!(canonicalize("a/c"), "a/c");
    }

    #[test]
    fn canonicalize_reaches_fixed_point() {
        let once = canonicalize("x/y/../../z/./w/..");
        assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn jar_local_entry_beats_global() {
        let store = EntryStore::new();
        put(&store, "com/x/Caller.class", "lib1.jar", b"class");
        put(&store, "lib1.jar/data.txt", "lib1.jar", b"local");
        put(&store, "data.txt", "lib2.jar", b"global");

        let resolver = Resolver::new(&store);
        assert_eq!(
            resolver.resolve("data.txt", Some("com/x/Caller.class")).as_deref(),
            Some("lib1.jar/data.txt")
        );
        assert_eq!(resolver.resolve("data.txt", None).as_deref(), Some("data.txt"));
    }

    #[test]
    fn unknown_caller_falls_back_to_global() {
        let store = EntryStore::new();
        put(&store, "data.txt", "lib2.jar", b"global");
        let resolver = Resolver::new(&store);
        assert_eq!(
            resolver.resolve("/data.txt", Some("com/missing/Caller.class")).as_deref(),
            Some("data.txt")
        );
        assert_eq!(resolver.resolve("nothing.txt", None), None);
    }

    #[test]
    fn dotted_requests_resolve_to_the_same_key() {
        let store = EntryStore::new();
        put(&store, "a/c", "lib.jar", b"c");
        let resolver = Resolver::new(&store);
        assert_eq!(resolver.resolve("/a/./b/../c", None), resolver.resolve("a/c", None));
        assert_eq!(resolver.resolve("a/c", None).as_deref(), Some("a/c"));
    }
}
