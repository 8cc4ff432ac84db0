use std::fmt;
use std::path::Path;

use crate::core::error::{LoaderError, LoaderResult};
use crate::core::store::CLASS_SUFFIX;

pub const LOCATOR_SCHEME: &str = "jarnest";

/// Origin of the container itself.
pub const ROOT_ORIGIN: &str = "/";

/// A resolved resource handed back to the host: which origin holds it, the
/// requested name, and a URL-like string the host's fetch layer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub origin: String,
    pub name: String,
    pub url: String,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Turns (origin, resource) pairs into locators and codebases.
pub trait LocatorStrategy: Send + Sync + fmt::Debug {
    fn locate(&self, origin: &str, resource: &str) -> LoaderResult<Locator>;

    fn codebase(&self, origin: &str) -> LoaderResult<String>;
}

/// Locators that point back into the loader's own memory
/// (`jarnest:/lib/util.jar/data.txt`).
#[derive(Debug, Default, Clone)]
pub struct InMemoryLocators;

impl LocatorStrategy for InMemoryLocators {
    fn locate(&self, origin: &str, resource: &str) -> LoaderResult<Locator> {
        let base = if resource.ends_with(CLASS_SUFFIX) {
            String::new()
        } else {
            format!("{origin}/")
        };
        Ok(Locator {
            origin: origin.to_string(),
            name: resource.to_string(),
            url: format!("{LOCATOR_SCHEME}:/{base}{resource}"),
        })
    }

    fn codebase(&self, origin: &str) -> LoaderResult<String> {
        Ok(format!("{LOCATOR_SCHEME}:{origin}"))
    }
}

/// Locators resolved against the bundle file on disk
/// (`jar:file:/apps/app.jar!/lib/util.jar!/data.txt`).
#[derive(Debug, Clone, Default)]
pub struct BundleFileLocators {
    bundle: Option<String>,
}

impl BundleFileLocators {
    pub fn new(bundle_path: Option<&Path>) -> Self {
        let bundle = bundle_path.map(|path| {
            let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            let text = canonical.to_string_lossy().replace('\\', "/");
            if text.starts_with('/') {
                format!("file:{text}")
            } else {
                format!("file:/{text}")
            }
        });
        Self { bundle }
    }

    fn bundle(&self) -> LoaderResult<&str> {
        self.bundle.as_deref().ok_or_else(|| {
            LoaderError::MalformedInput("bundle path unknown, cannot build file locator".into())
        })
    }
}

impl LocatorStrategy for BundleFileLocators {
    fn locate(&self, origin: &str, resource: &str) -> LoaderResult<Locator> {
        let bundle = self.bundle()?;
        let nested = if origin == ROOT_ORIGIN {
            String::new()
        } else {
            format!("{origin}!/")
        };
        Ok(Locator {
            origin: origin.to_string(),
            name: resource.to_string(),
            url: format!("jar:{bundle}!/{nested}{resource}"),
        })
    }

    fn codebase(&self, origin: &str) -> LoaderResult<String> {
        Ok(format!("jar:{}!/{}", self.bundle()?, origin))
    }
}
