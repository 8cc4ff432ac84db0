use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::loader::{BundleFileLocators, InMemoryLocators, LocatorStrategy};
use crate::core::native::{LegacyBinlibResolver, NativePathStrategy, NeutralBinlibResolver};

pub const FILE_LOCATORS: &str = "file";
pub const MEMORY_LOCATORS: &str = "memory";
pub const LEGACY_BINLIB: &str = "legacy";
pub const NEUTRAL_BINLIB: &str = "neutral";

pub type LocatorFactory = fn(Option<&Path>) -> Arc<dyn LocatorStrategy>;
pub type NativeStrategyFactory = fn() -> Arc<dyn NativePathStrategy>;

/// Named strategy factories, resolved once when a loader is built.
#[derive(Clone)]
pub struct StrategyRegistry {
    locators: HashMap<String, LocatorFactory>,
    natives: HashMap<String, NativeStrategyFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("locators", &self.locators.keys().collect::<Vec<_>>())
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self {
            locators: HashMap::new(),
            natives: HashMap::new(),
        };
        registry.register_locators(FILE_LOCATORS, |bundle| Arc::new(BundleFileLocators::new(bundle)));
        registry.register_locators(MEMORY_LOCATORS, |_| Arc::new(InMemoryLocators));
        registry.register_native(LEGACY_BINLIB, || Arc::new(LegacyBinlibResolver));
        registry.register_native(NEUTRAL_BINLIB, || Arc::new(NeutralBinlibResolver));
        registry
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_locators(&mut self, name: &str, factory: LocatorFactory) {
        self.locators.insert(name.to_string(), factory);
    }

    pub fn register_native(&mut self, name: &str, factory: NativeStrategyFactory) {
        self.natives.insert(name.to_string(), factory);
    }

    /// Locator strategy called `name`.
    ///
    /// Without a (known) name the file strategy is used when the bundle path
    /// is known and the in-memory one otherwise.
    pub fn locators(&self, name: Option<&str>, bundle: Option<&Path>) -> Arc<dyn LocatorStrategy> {
        let fallback = if bundle.is_some() {
            FILE_LOCATORS
        } else {
            MEMORY_LOCATORS
        };
        let chosen = match name {
            Some(name) if self.locators.contains_key(name) => name,
            Some(name) => {
                warn!("Unknown locator strategy {}, using {}", name, fallback);
                fallback
            }
            None => fallback,
        };
        debug!("locator strategy: {}", chosen);

        match self.locators.get(chosen) {
            Some(factory) => factory(bundle),
            None => Arc::new(InMemoryLocators),
        }
    }

    /// Native path strategy called `name`, `legacy` by default.
    pub fn native_strategy(&self, name: Option<&str>) -> Arc<dyn NativePathStrategy> {
        let factory = name.and_then(|name| {
            let factory = self.natives.get(name);
            if factory.is_none() {
                warn!("Unknown binlib resolver {}, using {}", name, LEGACY_BINLIB);
            }
            factory
        });

        match factory.or_else(|| self.natives.get(LEGACY_BINLIB)) {
            Some(factory) => factory(),
            None => Arc::new(LegacyBinlibResolver),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::ROOT_ORIGIN;
    use crate::core::platform::{OsFamily, Platform};

    fn linux64() -> Platform {
        Platform {
            os: OsFamily::Linux,
            arch: "x86_64".to_string(),
            version_tier: None,
        }
    }

    #[test]
    fn default_locators_depend_on_the_bundle_path() {
        let registry = StrategyRegistry::new();
        let memory = registry.locators(None, None);
        assert!(memory.locate(ROOT_ORIGIN, "a.txt").unwrap().url.starts_with("jarnest:"));

        let file = registry.locators(None, Some(Path::new("/no/such/app.jar")));
        assert!(file.locate(ROOT_ORIGIN, "a.txt").unwrap().url.starts_with("jar:file:"));
    }

    #[test]
    fn unknown_names_fall_back() {
        let registry = StrategyRegistry::new();
        let locators = registry.locators(Some("bogus"), None);
        assert!(locators.codebase("lib/a.jar").unwrap().starts_with("jarnest:"));

        let natives = registry.native_strategy(Some("bogus"));
        assert_eq!(natives.prefix(&linux64()).as_deref(), Some("binlib/linux64/"));
    }

    #[test]
    fn named_strategies_are_honoured() {
        let registry = StrategyRegistry::new();
        let natives = registry.native_strategy(Some(NEUTRAL_BINLIB));
        assert_eq!(natives.prefix(&linux64()).as_deref(), Some("binlib/"));

        let memory = registry.locators(Some(MEMORY_LOCATORS), Some(Path::new("/x/app.jar")));
        assert_eq!(memory.codebase("lib/a.jar").unwrap(), "jarnest:lib/a.jar");
    }

    #[test]
    fn custom_factories_can_be_registered() {
        #[derive(Debug)]
        struct Flat;
        impl NativePathStrategy for Flat {
            fn prefix(&self, _platform: &Platform) -> Option<String> {
                None
            }
        }

        let mut registry = StrategyRegistry::new();
        registry.register_native("flat", || Arc::new(Flat));
        assert_eq!(registry.native_strategy(Some("flat")).prefix(&linux64()), None);
    }
}
