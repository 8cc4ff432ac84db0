mod domain;
mod external;
mod guard;
mod jar_loader;
mod locator;
mod package;
mod record;
mod source;

pub use domain::{CodeDomain, DomainCache};
pub use external::{ExternalLoader, ExternalLocation, PATH_SEPARATOR};
pub use guard::ReentryGuard;
pub use jar_loader::{FindResources, JarLoader, JarLoaderBuilder};
pub use locator::{
    BundleFileLocators, InMemoryLocators, Locator, LocatorStrategy, LOCATOR_SCHEME, ROOT_ORIGIN,
};
pub use package::{package_of, package_of_entry, Package, PackageRegistry};
pub use record::{ClassRecorder, DEFAULT_RECORDING_DIR};
pub use source::{stream_of, ClassSource, DefinedClass, ResourceStream};
