// ─── Jar Loader ───
// The lookup surface over one entry store: external overrides, the parent
// chain, then the in-memory entries ingested from the bundle.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::domain::DomainCache;
use super::external::ExternalLoader;
use super::locator::{Locator, LocatorStrategy, ROOT_ORIGIN};
use super::package::{package_of, Package, PackageRegistry};
use super::record::ClassRecorder;
use super::source::{stream_of, ClassSource, DefinedClass, ResourceStream};
use crate::core::config::{LoaderSettings, StrategyRegistry};
use crate::core::error::{LoaderError, LoaderResult};
use crate::core::ingest::{ArchiveIngestor, BundleLayout, IngestReport, DEFAULT_LIB_PREFIX, MAIN_PREFIX};
use crate::core::native::NativeLibraryMaterializer;
use crate::core::platform::Platform;
use crate::core::resolve::{canonicalize, Resolver};
use crate::core::store::{class_entry_name, CachedEntry, EntryStore};

const DEFAULT_NAME: &str = "jarnest";

#[derive(Debug, Clone, Default)]
struct EntryPoint {
    main_class: Option<String>,
    main_archive: Option<String>,
}

pub struct JarLoader {
    name: String,
    parent: Option<Arc<dyn ClassSource>>,
    external: Option<ExternalLoader>,
    store: EntryStore,
    packages: PackageRegistry,
    domains: DomainCache,
    defined: RwLock<HashMap<String, Arc<DefinedClass>>>,
    locators: Arc<dyn LocatorStrategy>,
    natives: NativeLibraryMaterializer,
    platform: Platform,
    layout: BundleLayout,
    bundle_path: Option<PathBuf>,
    recorder: Option<ClassRecorder>,
    entry_point: RwLock<EntryPoint>,
}

#[derive(Default)]
pub struct JarLoaderBuilder {
    name: Option<String>,
    parent: Option<Arc<dyn ClassSource>>,
    settings: LoaderSettings,
    platform: Option<Platform>,
    bundle_path: Option<PathBuf>,
    registry: Option<StrategyRegistry>,
    wrap_prefix: Option<String>,
}

impl JarLoaderBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parent(mut self, parent: Arc<dyn ClassSource>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn settings(mut self, settings: LoaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundle_path = Some(path.into());
        self
    }

    pub fn registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Only ingest sub-archives under `prefix`; the loader stops delegating
    /// byte lookups to its parent.
    pub fn wrap_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.wrap_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> LoaderResult<JarLoader> {
        let settings = self.settings;
        let registry = self.registry.unwrap_or_default();
        let bundle_path = self.bundle_path;

        let locators = registry.locators(settings.locator.as_deref(), bundle_path.as_deref());
        let natives = NativeLibraryMaterializer::new(
            registry.native_strategy(settings.binlib_resolver.as_deref()),
            settings.expand_dir.clone(),
        );
        let external = settings
            .class_path()
            .map(ExternalLoader::from_class_path)
            .transpose()?;

        let layout = BundleLayout {
            lib_prefix: settings
                .lib_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_LIB_PREFIX.to_string()),
            main_prefix: MAIN_PREFIX.to_string(),
            wrap_prefix: self.wrap_prefix.or_else(|| settings.wrap_prefix.clone()),
        };
        let name = self.name.unwrap_or_else(|| match &layout.wrap_prefix {
            Some(wrap) => format!("{DEFAULT_NAME}:{wrap}"),
            None => DEFAULT_NAME.to_string(),
        });

        let recorder = settings
            .record
            .then(|| ClassRecorder::new(settings.recording_dir.clone(), settings.flatten));
        if let Some(recorder) = &recorder {
            info!("recording defined classes to {:?}", recorder.dir());
        }

        Ok(JarLoader {
            name,
            parent: self.parent,
            external,
            store: EntryStore::new(),
            packages: PackageRegistry::new(),
            domains: DomainCache::new(),
            defined: RwLock::new(HashMap::new()),
            locators,
            natives,
            platform: self.platform.unwrap_or_else(Platform::current),
            layout,
            bundle_path,
            recorder,
            entry_point: RwLock::new(EntryPoint::default()),
        })
    }
}

impl JarLoader {
    pub fn builder() -> JarLoaderBuilder {
        JarLoaderBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn bundle_path(&self) -> Option<&Path> {
        self.bundle_path.as_deref()
    }

    /// Entry point chosen by ingestion.
    pub fn main_class(&self) -> Option<String> {
        self.entry_point.read().main_class.clone()
    }

    /// Sub-archive whose descriptor declared the entry point.
    pub fn main_archive(&self) -> Option<String> {
        self.entry_point.read().main_archive.clone()
    }

    pub fn package(&self, name: &str) -> Option<Arc<Package>> {
        self.packages.get(name)
    }

    pub fn defined_class(&self, name: &str) -> Option<Arc<DefinedClass>> {
        self.defined.read().get(name).cloned()
    }

    /// Stream a container into the store. A main class already known to this
    /// loader takes precedence over descriptors found in the container.
    pub fn ingest<R: Read + Seek>(&self, reader: R, main_class: Option<&str>) -> IngestReport {
        let known = main_class.map(str::to_string).or_else(|| self.main_class());
        let report = ArchiveIngestor::new(
            &self.store,
            &self.packages,
            self.locators.as_ref(),
            &self.layout,
            self.platform.effective_tier(),
        )
        .ingest(reader, known.as_deref());

        let mut entry_point = self.entry_point.write();
        entry_point.main_class = report.main_class.clone();
        if report.main_archive.is_some() {
            entry_point.main_archive = report.main_archive.clone();
        }
        report
    }

    /// Ingest the bundle file this loader was built for.
    pub fn ingest_bundle(&self, main_class: Option<&str>) -> LoaderResult<IngestReport> {
        let path = self.bundle_path.as_deref().ok_or_else(|| {
            LoaderError::MalformedInput(format!("{} has no bundle path", self.name))
        })?;
        let file = File::open(path).map_err(|source| LoaderError::io(path, source))?;
        info!("{} ingesting {:?}", self.name, path);
        Ok(self.ingest(BufReader::new(file), main_class))
    }

    /// Define `name` from the store.
    ///
    /// A class is defined at most once; repeated calls hand back the same
    /// definition.
    pub fn find_class(&self, name: &str) -> LoaderResult<Arc<DefinedClass>> {
        if let Some(defined) = self.defined.read().get(name) {
            return Ok(defined.clone());
        }

        let entry_name = class_entry_name(name);
        let entry = self
            .store
            .get(&entry_name)
            .ok_or_else(|| LoaderError::ClassNotFound(name.to_string()))?;

        let domain = self
            .domains
            .get_or_create(&entry.origin, |origin| Ok(self.codebase(origin)))?;
        let package = match package_of(name) {
            Some(package) => Some(self.packages.verify_or_define(
                package,
                entry.descriptor.as_deref(),
                &domain.codebase,
            )?),
            None => None,
        };

        let mut created = false;
        let class = self
            .defined
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(DefinedClass {
                    name: name.to_string(),
                    bytes: entry.bytes.clone(),
                    domain,
                    package,
                })
            })
            .clone();

        if created {
            debug!("{} loaded from {} by {}", name, entry.origin, self.name);
            if let Some(recorder) = &self.recorder {
                recorder.record(&entry);
            }
        }
        Ok(class)
    }

    /// Resource lookup with the logical name of the requesting class, whose
    /// origin is searched before the global names.
    pub fn resource_stream_from(&self, name: &str, caller: Option<&str>) -> Option<ResourceStream> {
        if let Some(external) = &self.external {
            if let Some(stream) = external.resource_stream(name, self) {
                return Some(stream);
            }
        }
        if let Some(parent) = &self.parent {
            if let Some(stream) = parent.resource_stream(name) {
                return Some(stream);
            }
        }

        let stream = self.local_stream(name, caller);
        if stream.is_none() {
            debug!("{}: resource {} not found", self.name, name);
        }
        stream
    }

    /// Store, sub-archive and upward byte lookups, without the external and
    /// parent tiers.
    fn local_stream(&self, name: &str, caller: Option<&str>) -> Option<ResourceStream> {
        if let Some(entry) = self.lookup(name, caller) {
            return Some(stream_of(entry.bytes.clone()));
        }
        if let Some(stream) = self.sub_archive_stream(name) {
            return Some(stream);
        }
        if self.layout.wrap_prefix.is_none() {
            if let Some(parent) = &self.parent {
                return parent.byte_stream(name);
            }
        }
        None
    }

    pub fn find_resource_from(&self, name: &str, caller: Option<&str>) -> Option<Locator> {
        if let Some(external) = &self.external {
            if let Some(locator) = external.resource(name, self) {
                return Some(locator);
            }
        }
        if let Some(parent) = &self.parent {
            if let Some(locator) = parent.resource(name) {
                return Some(locator);
            }
        }

        if let Some(entry) = self.lookup(name, caller) {
            let prefix = format!("{}/", entry.origin);
            let resource = entry
                .logical_name
                .strip_prefix(&prefix)
                .unwrap_or(&entry.logical_name);
            return self.locate(&entry.origin, resource);
        }

        let canonical = canonicalize(name);
        let bare = strip_root(&canonical);
        if self.store.is_known_origin(bare) {
            return self.locate(ROOT_ORIGIN, bare);
        }
        None
    }

    /// Every origin that carries its own copy of `name`, in ingestion order.
    pub fn find_resources(&self, name: &str) -> FindResources<'_> {
        let canonical = canonicalize(name);
        FindResources {
            loader: self,
            name: strip_root(&canonical).to_string(),
            origins: self.store.known_origins().into_iter(),
        }
    }

    /// Real path of bundled native library `name`, extracted on demand.
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        self.natives.find(name, &self.store, &self.platform)
    }

    fn lookup(&self, name: &str, caller: Option<&str>) -> Option<Arc<CachedEntry>> {
        Resolver::new(&self.store)
            .resolve(name, caller)
            .and_then(|key| self.store.get(&key))
            .or_else(|| self.store.get(name))
    }

    /// Raw bytes of a sub-archive itself, read back from the bundle file.
    fn sub_archive_stream(&self, name: &str) -> Option<ResourceStream> {
        let canonical = canonicalize(name);
        let origin = strip_root(&canonical);
        if origin == ROOT_ORIGIN || !self.store.is_known_origin(origin) {
            return None;
        }
        let Some(bundle) = self.bundle_path.as_deref() else {
            debug!("{} is a sub-archive but no bundle path is known", origin);
            return None;
        };

        match read_bundle_entry(bundle, origin) {
            Ok(bytes) => Some(stream_of(Arc::from(bytes))),
            Err(err) => {
                warn!("Unable to read {} from {:?}: {}", origin, bundle, err);
                None
            }
        }
    }

    fn locate(&self, origin: &str, resource: &str) -> Option<Locator> {
        match self.locators.locate(origin, resource) {
            Ok(locator) => Some(locator),
            Err(err) => {
                warn!("Unable to build locator for {} in {}: {}", resource, origin, err);
                None
            }
        }
    }

    fn codebase(&self, origin: &str) -> String {
        self.locators.codebase(origin).unwrap_or_else(|err| {
            warn!("Unable to build codebase for {}: {}", origin, err);
            origin.to_string()
        })
    }
}

impl ClassSource for JarLoader {
    fn load_class(&self, name: &str) -> LoaderResult<Arc<DefinedClass>> {
        if let Some(external) = &self.external {
            match external.load_class(name, self) {
                Ok(class) => return Ok(class),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        if let Some(parent) = &self.parent {
            match parent.load_class(name) {
                Ok(class) => return Ok(class),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        self.find_class(name)
    }

    fn resource_stream(&self, name: &str) -> Option<ResourceStream> {
        self.resource_stream_from(name, None)
    }

    fn resource(&self, name: &str) -> Option<Locator> {
        self.find_resource_from(name, None)
    }

    fn byte_stream(&self, name: &str) -> Option<ResourceStream> {
        self.local_stream(name, None)
    }
}

impl fmt::Display for JarLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bundle_path() {
            Some(bundle) => write!(f, "{} ({})", self.name, bundle.display()),
            None => f.write_str(&self.name),
        }
    }
}

/// Lazy walk over the known origins. Not restartable: the origin list is
/// captured when the walk is created.
pub struct FindResources<'a> {
    loader: &'a JarLoader,
    name: String,
    origins: std::vec::IntoIter<String>,
}

impl Iterator for FindResources<'_> {
    type Item = Locator;

    fn next(&mut self) -> Option<Locator> {
        for origin in self.origins.by_ref() {
            let key = format!("{origin}/{}", self.name);
            if self.loader.store.contains(&key) {
                if let Some(locator) = self.loader.locate(&origin, &self.name) {
                    return Some(locator);
                }
            }
        }
        None
    }
}

fn strip_root(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

fn read_bundle_entry(bundle: &Path, name: &str) -> LoaderResult<Vec<u8>> {
    let file = File::open(bundle).map_err(|source| LoaderError::io(bundle, source))?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut entry = archive.by_name(name)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}
