use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::descriptor::{
    Descriptor, IMPLEMENTATION_TITLE, IMPLEMENTATION_VENDOR, IMPLEMENTATION_VERSION,
    SPECIFICATION_TITLE, SPECIFICATION_VENDOR, SPECIFICATION_VERSION,
};
use crate::core::error::{LoaderError, LoaderResult};

/// Package metadata derived from the descriptor of the first origin that
/// contributed a class to the package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    /// Dotted package name.
    pub name: String,
    pub spec_title: Option<String>,
    pub spec_version: Option<String>,
    pub spec_vendor: Option<String>,
    pub impl_title: Option<String>,
    pub impl_version: Option<String>,
    pub impl_vendor: Option<String>,
    /// Codebase the package is sealed to, if sealed.
    pub seal_base: Option<String>,
}

impl Package {
    pub fn from_descriptor(name: &str, descriptor: Option<&Descriptor>, codebase: &str) -> Self {
        let Some(descriptor) = descriptor else {
            return Self {
                name: name.to_string(),
                ..Self::default()
            };
        };

        let path = name.replace('.', "/");
        let attribute = |key: &str| descriptor.package_attribute(&path, key).map(str::to_string);

        Self {
            name: name.to_string(),
            spec_title: attribute(SPECIFICATION_TITLE),
            spec_version: attribute(SPECIFICATION_VERSION),
            spec_vendor: attribute(SPECIFICATION_VENDOR),
            impl_title: attribute(IMPLEMENTATION_TITLE),
            impl_version: attribute(IMPLEMENTATION_VERSION),
            impl_vendor: attribute(IMPLEMENTATION_VENDOR),
            seal_base: descriptor
                .is_sealed(&path)
                .then(|| codebase.to_string()),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.seal_base.is_some()
    }

    pub fn is_sealed_to(&self, codebase: &str) -> bool {
        self.seal_base.as_deref() == Some(codebase)
    }
}

/// Dotted package of a dotted class name (`com.x.Main` -> `com.x`).
pub fn package_of(class_name: &str) -> Option<&str> {
    class_name.rsplit_once('.').map(|(package, _)| package)
}

/// Dotted package of a class entry path (`com/x/Main.class` -> `com.x`).
pub fn package_of_entry(entry_name: &str) -> Option<String> {
    entry_name
        .rsplit_once('/')
        .map(|(package, _)| package.replace('/', "."))
}

#[derive(Debug, Default)]
pub struct PackageRegistry {
    packages: RwLock<HashMap<String, Arc<Package>>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Package>> {
        self.packages.read().get(name).cloned()
    }

    /// Return the package, defining it from `descriptor` on first sight.
    ///
    /// Fails when the package is sealed to another codebase, or when
    /// `descriptor` wants to seal a package that is already defined unsealed.
    pub fn verify_or_define(
        &self,
        name: &str,
        descriptor: Option<&Descriptor>,
        codebase: &str,
    ) -> LoaderResult<Arc<Package>> {
        if let Some(existing) = self.get(name) {
            return verify(&existing, descriptor, codebase).map(|()| existing);
        }

        let mut packages = self.packages.write();
        if let Some(existing) = packages.get(name) {
            return verify(existing, descriptor, codebase).map(|()| existing.clone());
        }

        let package = Arc::new(Package::from_descriptor(name, descriptor, codebase));
        debug!(
            "defined package {} (sealed: {})",
            package.name,
            package.is_sealed()
        );
        packages.insert(name.to_string(), package.clone());
        Ok(package)
    }

    pub fn len(&self) -> usize {
        self.packages.read().len()
    }
}

fn verify(existing: &Package, descriptor: Option<&Descriptor>, codebase: &str) -> LoaderResult<()> {
    if existing.is_sealed() {
        if !existing.is_sealed_to(codebase) {
            return Err(LoaderError::SecurityViolation(format!(
                "package {} is sealed",
                existing.name
            )));
        }
        return Ok(());
    }

    let path = existing.name.replace('.', "/");
    if descriptor.is_some_and(|descriptor| descriptor.is_sealed(&path)) {
        return Err(LoaderError::SecurityViolation(format!(
            "can't seal package {}: already loaded",
            existing.name
        )));
    }
    Ok(())
}
