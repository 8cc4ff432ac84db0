// ─── Archive Ingestor ───
// Streams the container once and feeds every nested entry into the store,
// falling back to the central directory for entries that cannot be streamed.

use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use super::layout::{BundleLayout, EntryKind};
use crate::core::descriptor::{Descriptor, DESCRIPTOR_PATH};
use crate::core::loader::{package_of_entry, LocatorStrategy, PackageRegistry, ROOT_ORIGIN};
use crate::core::platform::BASELINE_TIER;
use crate::core::store::{CachedEntry, EntryStore, CLASS_SUFFIX};

pub const VERSIONED_PREFIX: &str = "META-INF/versions/";

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Effective entry point: the caller's, or the first one declared by a
    /// main sub-archive.
    pub main_class: Option<String>,
    /// Sub-archive that declared `main_class`.
    pub main_archive: Option<String>,
    pub sub_archives: usize,
    /// Store insertions that took effect.
    pub stored: usize,
    /// Entries abandoned because they could not be read.
    pub failures: Vec<String>,
    /// Classes whose package conflicts with an existing sealed definition.
    pub sealing_conflicts: Vec<String>,
}

/// Split `META-INF/versions/<n>/<path>` into `(n, path)`.
pub fn split_versioned(entry_name: &str) -> Option<(u32, &str)> {
    let rest = entry_name.strip_prefix(VERSIONED_PREFIX)?;
    let (tier, path) = rest.split_once('/')?;
    if path.is_empty() {
        return None;
    }
    tier.parse::<u32>().ok().map(|tier| (tier, path))
}

pub struct ArchiveIngestor<'a> {
    store: &'a EntryStore,
    packages: &'a PackageRegistry,
    locators: &'a dyn LocatorStrategy,
    layout: &'a BundleLayout,
    /// Platform tier for versioned overrides; `None` disables tiering.
    platform_tier: Option<u32>,
}

/// State carried across the container's top-level entries.
struct ContainerPass {
    descriptor: Option<Arc<Descriptor>>,
    descriptor_window: bool,
}

impl Default for ContainerPass {
    fn default() -> Self {
        Self {
            descriptor: None,
            descriptor_window: true,
        }
    }
}

impl<'a> ArchiveIngestor<'a> {
    pub fn new(
        store: &'a EntryStore,
        packages: &'a PackageRegistry,
        locators: &'a dyn LocatorStrategy,
        layout: &'a BundleLayout,
        platform_tier: Option<u32>,
    ) -> Self {
        Self {
            store,
            packages,
            locators,
            layout,
            platform_tier,
        }
    }

    /// Stream `reader` as a zip container and populate the store.
    ///
    /// Entries whose local header defers its sizes to a data descriptor
    /// cannot be streamed; from the first such entry on, the rest of the
    /// container is read through its central directory in the same order.
    ///
    /// Ingestion is best-effort: unreadable entries are logged and listed in
    /// the report, and a broken container ends the pass early.
    pub fn ingest<R: Read + Seek>(&self, mut reader: R, main_class: Option<&str>) -> IngestReport {
        let mut report = IngestReport {
            main_class: main_class.map(str::to_string),
            ..IngestReport::default()
        };
        let mut pass = ContainerPass::default();
        let mut streamed = 0;
        let mut deferred = false;

        loop {
            let mut file = match zip::read::read_zipfile_from_stream(&mut reader) {
                Ok(Some(file)) => file,
                Ok(None) => break,
                Err(ZipError::UnsupportedArchive(reason)) => {
                    debug!(
                        "entry #{} cannot be streamed ({}), using the central directory",
                        streamed, reason
                    );
                    deferred = true;
                    break;
                }
                Err(err) => {
                    error!("Unable to read container: {}", err);
                    report.failures.push(format!("container: {err}"));
                    break;
                }
            };
            streamed += 1;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let mut bytes = Vec::new();
            if let Err(err) = file.read_to_end(&mut bytes) {
                warn!("Unable to read {}: {}", name, err);
                report.failures.push(format!("{name}: {err}"));
                continue;
            }
            drop(file);

            self.ingest_container_entry(&name, bytes, &mut pass, &mut report);
        }

        if deferred {
            self.ingest_indexed(reader, streamed, &mut pass, &mut report);
        }

        info!(
            "ingested {} sub-archives, {} entries stored, main class {:?}",
            report.sub_archives, report.stored, report.main_class
        );
        report
    }

    /// Continue a pass through the central directory, skipping the `skip`
    /// entries already streamed.
    fn ingest_indexed<R: Read + Seek>(
        &self,
        reader: R,
        skip: usize,
        pass: &mut ContainerPass,
        report: &mut IngestReport,
    ) {
        let mut archive = match ZipArchive::new(reader) {
            Ok(archive) => archive,
            Err(err) => {
                error!("Unable to read container: {}", err);
                report.failures.push(format!("container: {err}"));
                return;
            }
        };

        for index in skip..archive.len() {
            let mut file = match archive.by_index(index) {
                Ok(file) => file,
                Err(err) => {
                    warn!("Unable to read container entry #{}: {}", index, err);
                    report.failures.push(format!("container#{index}: {err}"));
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let mut bytes = Vec::new();
            if let Err(err) = file.read_to_end(&mut bytes) {
                warn!("Unable to read {}: {}", name, err);
                report.failures.push(format!("{name}: {err}"));
                continue;
            }
            drop(file);

            self.ingest_container_entry(&name, bytes, pass, report);
        }
    }

    fn ingest_container_entry(
        &self,
        name: &str,
        bytes: Vec<u8>,
        pass: &mut ContainerPass,
        report: &mut IngestReport,
    ) {
        // Only a descriptor that opens the container counts.
        if pass.descriptor_window && name == DESCRIPTOR_PATH {
            pass.descriptor = parse_descriptor(&bytes, ROOT_ORIGIN);
            pass.descriptor_window = false;
            return;
        }
        pass.descriptor_window = false;

        match self.layout.classify(name) {
            EntryKind::Skip => debug!("skipping {} outside the wrap prefix", name),
            EntryKind::SubArchive { is_main } => {
                debug!("caching {}", name);
                self.ingest_sub_archive(name, bytes, is_main, report);
            }
            EntryKind::Loose => {
                self.ingest_entry(
                    name,
                    Arc::from(bytes),
                    ROOT_ORIGIN,
                    pass.descriptor.clone(),
                    report,
                );
                debug!("container entry: {}", name);
            }
        }
    }

    fn ingest_sub_archive(
        &self,
        origin: &str,
        bytes: Vec<u8>,
        is_main: bool,
        report: &mut IngestReport,
    ) {
        let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
            Ok(archive) => archive,
            Err(err) => {
                warn!("Unable to open sub-archive {}: {}", origin, err);
                report.failures.push(format!("{origin}: {err}"));
                return;
            }
        };
        report.sub_archives += 1;
        self.store.record_origin(origin);

        let descriptor = read_descriptor(&mut archive, origin);
        if descriptor.is_none() {
            warn!("No descriptor in sub-archive {}", origin);
        }

        for index in 0..archive.len() {
            let mut inner = match archive.by_index(index) {
                Ok(inner) => inner,
                Err(err) => {
                    warn!("Unable to read entry #{} of {}: {}", index, origin, err);
                    report.failures.push(format!("{origin}#{index}: {err}"));
                    continue;
                }
            };
            if inner.is_dir() {
                continue;
            }

            let inner_name = inner.name().to_string();
            let mut buffer = Vec::new();
            if let Err(err) = inner.read_to_end(&mut buffer) {
                warn!("Unable to read {}/{}: {}", origin, inner_name, err);
                report.failures.push(format!("{origin}/{inner_name}: {err}"));
                continue;
            }
            drop(inner);

            self.ingest_entry(
                &inner_name,
                Arc::from(buffer),
                origin,
                descriptor.clone(),
                report,
            );
        }

        if is_main {
            self.note_main_class(origin, descriptor.as_deref(), report);
        }
    }

    fn note_main_class(&self, origin: &str, descriptor: Option<&Descriptor>, report: &mut IngestReport) {
        let Some(declared) = descriptor.and_then(Descriptor::main_class) else {
            return;
        };

        match (&report.main_class, &report.main_archive) {
            (None, _) => {
                info!("main class {} declared by {}", declared, origin);
                report.main_class = Some(declared.to_string());
                report.main_archive = Some(origin.to_string());
            }
            (Some(main_class), Some(main_archive)) => {
                warn!(
                    "A main class is defined in multiple sub-archives inside {}: {} and {}",
                    self.layout.main_prefix, main_archive, origin
                );
                warn!("The main class {} from {} will be used", main_class, main_archive);
            }
            (Some(_), None) => {
                debug!("ignoring main class {} from {}: caller supplied one", declared, origin)
            }
        }
    }

    fn ingest_entry(
        &self,
        entry_name: &str,
        bytes: Arc<[u8]>,
        origin: &str,
        descriptor: Option<Arc<Descriptor>>,
        report: &mut IngestReport,
    ) {
        let tiering = descriptor
            .as_deref()
            .is_some_and(Descriptor::is_multi_release)
            .then_some(self.platform_tier)
            .flatten();
        let versioned = tiering.and_then(|_| split_versioned(entry_name));

        let (logical, tier) = match versioned {
            Some((tier, base)) => (base.to_string(), Some(tier)),
            None => (entry_name.to_string(), None),
        };
        let entry = CachedEntry::new(&logical, entry_name, bytes, origin, descriptor.clone())
            .with_tier(tier.unwrap_or(BASELINE_TIER));

        if logical.ends_with(CLASS_SUFFIX) {
            self.ensure_package(&logical, origin, descriptor.as_deref(), report);
            self.store_entry(entry, tier, report);
            debug!("cached bytes for class {}", logical);
            return;
        }

        // Resources are kept twice: jar-local, and global where the first
        // origin to provide a name wins.
        let local_name = format!("{origin}/{logical}");
        self.store_entry(entry.renamed(&local_name), tier, report);
        self.store.record_origin(origin);
        debug!("cached bytes for local name {}", local_name);

        self.store_entry(entry, tier, report);
    }

    fn store_entry(&self, entry: CachedEntry, tier: Option<u32>, report: &mut IngestReport) {
        let stored = match (tier, self.platform_tier) {
            (Some(_), Some(platform_tier)) => self.store.put_versioned(entry, platform_tier),
            _ => self.store.put(entry, true),
        };
        if stored {
            report.stored += 1;
        }
    }

    fn ensure_package(
        &self,
        class_entry: &str,
        origin: &str,
        descriptor: Option<&Descriptor>,
        report: &mut IngestReport,
    ) {
        let Some(package) = package_of_entry(class_entry) else {
            return;
        };
        let codebase = self
            .locators
            .codebase(origin)
            .unwrap_or_else(|_| origin.to_string());

        if let Err(err) = self.packages.verify_or_define(&package, descriptor, &codebase) {
            error!("{} ({} from {})", err, class_entry, origin);
            report
                .sealing_conflicts
                .push(format!("{origin}/{class_entry}: {err}"));
        }
    }
}

fn read_descriptor<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    origin: &str,
) -> Option<Arc<Descriptor>> {
    let mut file = archive.by_name(DESCRIPTOR_PATH).ok()?;
    let mut bytes = Vec::new();
    if let Err(err) = file.read_to_end(&mut bytes) {
        warn!("Unable to read descriptor of {}: {}", origin, err);
        return None;
    }
    parse_descriptor(&bytes, origin)
}

fn parse_descriptor(bytes: &[u8], origin: &str) -> Option<Arc<Descriptor>> {
    match Descriptor::parse(bytes) {
        Ok(descriptor) => Some(Arc::new(descriptor)),
        Err(err) => {
            warn!("Ignoring unreadable descriptor of {}: {}", origin, err);
            None
        }
    }
}
