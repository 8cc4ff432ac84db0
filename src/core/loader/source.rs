use std::io::Cursor;
use std::sync::Arc;

use super::domain::CodeDomain;
use super::locator::Locator;
use super::package::Package;
use crate::core::error::LoaderResult;

/// Readable view over cached bytes.
pub type ResourceStream = Cursor<Arc<[u8]>>;

pub fn stream_of(bytes: Arc<[u8]>) -> ResourceStream {
    Cursor::new(bytes)
}

/// A loadable unit produced from raw class bytes and the domain of the
/// origin that supplied them.
#[derive(Debug)]
pub struct DefinedClass {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub domain: Arc<CodeDomain>,
    pub package: Option<Arc<Package>>,
}

/// The lookup surface every loader in a delegation chain offers.
///
/// Host loaders plug into [`JarLoader`](super::JarLoader) as parents through
/// this trait.
pub trait ClassSource: Send + Sync {
    fn load_class(&self, name: &str) -> LoaderResult<Arc<DefinedClass>>;

    fn resource_stream(&self, name: &str) -> Option<ResourceStream>;

    fn resource(&self, name: &str) -> Option<Locator>;

    /// Byte lookup used when a wrapped child delegates upward. Defaults to
    /// the full resource lookup.
    fn byte_stream(&self, name: &str) -> Option<ResourceStream> {
        self.resource_stream(name)
    }
}
