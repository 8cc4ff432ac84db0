// ─── External Override Loader ───
// Locations from the pipe-delimited class path, consulted around the
// in-memory store. Delegates back into its owner first; the re-entrancy
// guard turns the resulting cycle into a plain miss.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use super::domain::DomainCache;
use super::guard::ReentryGuard;
use super::locator::Locator;
use super::source::{stream_of, ClassSource, DefinedClass, ResourceStream};
use crate::core::error::{LoaderError, LoaderResult};
use crate::core::http::build_http_client;
use crate::core::resolve::canonicalize;
use crate::core::store::class_entry_name;

pub const PATH_SEPARATOR: char = '|';

const LOAD_CLASS: &str = "loadClass():";
const GET_RESOURCE: &str = "getResource():";
const GET_RESOURCE_STREAM: &str = "getResourceAsStream():";

static NEXT_EXTERNAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalLocation {
    /// Directory searched by relative path.
    Directory(PathBuf),
    /// Zip archive searched by entry name.
    Archive(PathBuf),
    /// Base URL fetched over HTTP(S).
    Remote(Url),
}

impl ExternalLocation {
    /// Parse one class-path element: an `http(s)`/`file` URL or a plain path.
    pub fn parse(token: &str) -> LoaderResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(LoaderError::MalformedInput("empty external path".into()));
        }

        if let Ok(url) = Url::parse(token) {
            match url.scheme() {
                "http" | "https" => return Ok(Self::Remote(with_trailing_slash(url))),
                "file" => {
                    let path = url.to_file_path().map_err(|()| {
                        LoaderError::MalformedInput(format!("invalid file URL: {token}"))
                    })?;
                    return Self::from_path(&path);
                }
                // Drive letters (`C:\libs`) parse as one-letter schemes.
                scheme if scheme.len() == 1 => {}
                scheme => {
                    return Err(LoaderError::MalformedInput(format!(
                        "unsupported scheme {scheme:?} in external path {token}"
                    )))
                }
            }
        }

        Self::from_path(Path::new(token))
    }

    fn from_path(path: &Path) -> LoaderResult<Self> {
        let canonical = std::fs::canonicalize(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if canonical.is_dir() {
            Ok(Self::Directory(canonical))
        } else {
            Ok(Self::Archive(canonical))
        }
    }

    /// Codebase string for classes defined from this location.
    pub fn url(&self) -> String {
        match self {
            Self::Directory(path) => format!("{}/", file_url(path)),
            Self::Archive(path) => file_url(path),
            Self::Remote(url) => url.to_string(),
        }
    }

    fn locator_url(&self, name: &str) -> String {
        match self {
            Self::Directory(_) | Self::Remote(_) => format!("{}{}", self.url(), name),
            Self::Archive(_) => format!("jar:{}!/{}", self.url(), name),
        }
    }

    /// Fetch `name` from this location; `Ok(None)` when it is not there or
    /// would climb out of the location.
    fn fetch(&self, name: &str, http: Option<&Client>) -> LoaderResult<Option<Vec<u8>>> {
        let Some(relative) = relative_name(name) else {
            debug!("refusing {} outside {}", name, self.url());
            return Ok(None);
        };
        let name = relative.as_str();
        match self {
            Self::Directory(dir) => {
                // Missing files fail to canonicalize.
                let Ok(path) = std::fs::canonicalize(dir.join(name)) else {
                    return Ok(None);
                };
                if !path.starts_with(dir) {
                    warn!("{} resolves outside {}", name, dir.display());
                    return Ok(None);
                }
                if !path.is_file() {
                    return Ok(None);
                }
                std::fs::read(&path)
                    .map(Some)
                    .map_err(|source| LoaderError::Io { path, source })
            }
            Self::Archive(path) => {
                let file = std::fs::File::open(path).map_err(|source| LoaderError::Io {
                    path: path.clone(),
                    source,
                })?;
                let mut archive = zip::ZipArchive::new(file)?;
                let mut entry = match archive.by_name(name) {
                    Ok(entry) => entry,
                    Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                    Err(err) => return Err(err.into()),
                };
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            Self::Remote(base) => {
                let client = http.ok_or_else(|| {
                    LoaderError::Other("no HTTP client for remote location".into())
                })?;
                let url = base.join(name).map_err(|err| {
                    LoaderError::MalformedInput(format!("cannot join {name} onto {base}: {err}"))
                })?;
                let response = client.get(url.clone()).send()?;
                match response.status() {
                    status if status.is_success() => Ok(Some(response.bytes()?.to_vec())),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => {
                        warn!("{} answered HTTP {}", url, status.as_u16());
                        Ok(None)
                    }
                }
            }
        }
    }
}

/// Canonical form of `name` relative to a location root, or `None` when it
/// is empty or still climbs above the root.
fn relative_name(name: &str) -> Option<String> {
    let canonical = canonicalize(name);
    let relative = canonical.strip_prefix('/').unwrap_or(&canonical);
    if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(relative.to_string())
}

fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    format!("file:/{}", text.trim_start_matches('/'))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Loader over the external override locations.
#[derive(Debug)]
pub struct ExternalLoader {
    id: u64,
    locations: Vec<ExternalLocation>,
    http: Option<Client>,
    domains: DomainCache,
    defined: RwLock<HashMap<String, Arc<DefinedClass>>>,
}

impl ExternalLoader {
    pub fn new(locations: Vec<ExternalLocation>) -> LoaderResult<Self> {
        let needs_http = locations
            .iter()
            .any(|location| matches!(location, ExternalLocation::Remote(_)));
        let http = if needs_http {
            Some(build_http_client()?)
        } else {
            None
        };

        Ok(Self {
            id: NEXT_EXTERNAL_ID.fetch_add(1, Ordering::Relaxed),
            locations,
            http,
            domains: DomainCache::new(),
            defined: RwLock::new(HashMap::new()),
        })
    }

    /// Build from a `|`-separated class path. Elements that cannot be parsed
    /// are logged and skipped.
    pub fn from_class_path(class_path: &str) -> LoaderResult<Self> {
        let mut locations = Vec::new();
        for token in class_path.split(PATH_SEPARATOR) {
            if token.trim().is_empty() {
                continue;
            }
            match ExternalLocation::parse(token) {
                Ok(location) => locations.push(location),
                Err(err) => warn!("Unable to parse external path: {}: {}", token, err),
            }
        }
        info!(
            "external locations={:?}",
            locations.iter().map(ExternalLocation::url).collect::<Vec<_>>()
        );
        Self::new(locations)
    }

    pub fn locations(&self) -> &[ExternalLocation] {
        &self.locations
    }

    fn signature(&self, operation: &str, name: &str) -> String {
        format!("{}#{}{}", self.id, operation, name)
    }

    /// Load `name`, letting `owner` answer first.
    ///
    /// When `owner` calls back in for the same class on the same thread the
    /// call fails with [`LoaderError::Reentrant`].
    pub fn load_class(&self, name: &str, owner: &dyn ClassSource) -> LoaderResult<Arc<DefinedClass>> {
        let signature = self.signature(LOAD_CLASS, name);
        let Some(_guard) = ReentryGuard::enter(&signature) else {
            return Err(LoaderError::Reentrant(signature));
        };
        debug!("external loadClass({})", name);

        if let Some(defined) = self.defined.read().get(name) {
            return Ok(defined.clone());
        }

        match owner.load_class(name) {
            Ok(class) => return Ok(class),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        self.find_class(name)
    }

    fn find_class(&self, name: &str) -> LoaderResult<Arc<DefinedClass>> {
        let path = class_entry_name(name);
        for location in &self.locations {
            let bytes = match location.fetch(&path, self.http.as_ref()) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    warn!("external lookup of {} in {} failed: {}", path, location.url(), err);
                    continue;
                }
            };

            let domain = self
                .domains
                .get_or_create(&location.url(), |origin| Ok(origin.to_string()))?;
            let mut defined = self.defined.write();
            let class = defined
                .entry(name.to_string())
                .or_insert_with(|| {
                    info!("{} loaded from external location {}", name, domain.codebase);
                    Arc::new(DefinedClass {
                        name: name.to_string(),
                        bytes: Arc::from(bytes),
                        domain: domain.clone(),
                        package: None,
                    })
                })
                .clone();
            return Ok(class);
        }
        Err(LoaderError::ClassNotFound(name.to_string()))
    }

    pub fn resource_stream(&self, name: &str, owner: &dyn ClassSource) -> Option<ResourceStream> {
        let signature = self.signature(GET_RESOURCE_STREAM, name);
        let _guard = ReentryGuard::enter(&signature)?;
        debug!("external getResourceAsStream({})", name);

        if let Some(stream) = owner.resource_stream(name) {
            return Some(stream);
        }

        self.locations.iter().find_map(|location| {
            match location.fetch(name, self.http.as_ref()) {
                Ok(found) => found.map(|bytes| stream_of(Arc::from(bytes))),
                Err(err) => {
                    warn!("external lookup of {} in {} failed: {}", name, location.url(), err);
                    None
                }
            }
        })
    }

    pub fn resource(&self, name: &str, owner: &dyn ClassSource) -> Option<Locator> {
        let signature = self.signature(GET_RESOURCE, name);
        let _guard = ReentryGuard::enter(&signature)?;
        debug!("external getResource({})", name);

        if let Some(locator) = owner.resource(name) {
            return Some(locator);
        }

        let relative = relative_name(name)?;
        self.locations.iter().find_map(|location| {
            match location.fetch(&relative, self.http.as_ref()) {
                Ok(Some(_)) => Some(Locator {
                    origin: location.url(),
                    name: name.to_string(),
                    url: location.locator_url(&relative),
                }),
                Ok(None) => None,
                Err(err) => {
                    warn!("external lookup of {} in {} failed: {}", name, location.url(), err);
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures;

    /// Owner that always misses but counts how often it was asked.
    #[derive(Default)]
    struct Missing {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ClassSource for Missing {
        fn load_class(&self, name: &str) -> LoaderResult<Arc<DefinedClass>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LoaderError::ClassNotFound(name.to_string()))
        }

        fn resource_stream(&self, _name: &str) -> Option<ResourceStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn resource(&self, _name: &str) -> Option<Locator> {
            None
        }
    }

    #[test]
    fn parses_directories_archives_and_urls() {
        let temp = tempfile::tempdir().unwrap();
        let jar = temp.path().join("extra.jar");
        std::fs::write(&jar, fixtures::jar(&[("a.txt", b"a")])).unwrap();

        assert!(matches!(
            ExternalLocation::parse(temp.path().to_str().unwrap()).unwrap(),
            ExternalLocation::Directory(_)
        ));
        assert!(matches!(
            ExternalLocation::parse(jar.to_str().unwrap()).unwrap(),
            ExternalLocation::Archive(_)
        ));
        match ExternalLocation::parse("https://repo.example.com/classes").unwrap() {
            ExternalLocation::Remote(url) => {
                assert_eq!(url.as_str(), "https://repo.example.com/classes/")
            }
            other => panic!("unexpected location {other:?}"),
        }
        assert!(ExternalLocation::parse("ftp://example.com/x").is_err());
        assert!(ExternalLocation::parse("/definitely/not/here").is_err());
    }

    #[test]
    fn class_path_skips_unparseable_elements() {
        let temp = tempfile::tempdir().unwrap();
        let class_path = format!("/definitely/not/here|{}|", temp.path().display());
        let loader = ExternalLoader::from_class_path(&class_path).unwrap();
        assert_eq!(loader.locations().len(), 1);
    }

    #[test]
    fn loads_classes_from_directories_and_archives() {
        let temp = tempfile::tempdir().unwrap();
        let classes = temp.path().join("classes");
        std::fs::create_dir_all(classes.join("com/ext")).unwrap();
        std::fs::write(classes.join("com/ext/Dir.class"), b"dir").unwrap();
        let jar = temp.path().join("extra.jar");
        std::fs::write(&jar, fixtures::jar(&[("com/ext/Zipped.class", b"zipped")])).unwrap();

        let loader = ExternalLoader::new(vec![
            ExternalLocation::parse(classes.to_str().unwrap()).unwrap(),
            ExternalLocation::parse(jar.to_str().unwrap()).unwrap(),
        ])
        .unwrap();
        let owner = Missing::default();

        let dir = loader.load_class("com.ext.Dir", &owner).unwrap();
        assert_eq!(&dir.bytes[..], b"dir");
        assert!(dir.domain.codebase.ends_with("/classes/"));

        let zipped = loader.load_class("com.ext.Zipped", &owner).unwrap();
        assert_eq!(&zipped.bytes[..], b"zipped");

        let again = loader.load_class("com.ext.Dir", &owner).unwrap();
        assert!(Arc::ptr_eq(&dir, &again));

        let err = loader.load_class("com.ext.Missing", &owner).unwrap_err();
        assert!(matches!(err, LoaderError::ClassNotFound(_)));
    }

    #[test]
    fn resources_come_from_owner_before_locations() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("conf.txt"), b"external").unwrap();
        let loader =
            ExternalLoader::new(vec![ExternalLocation::parse(temp.path().to_str().unwrap()).unwrap()])
                .unwrap();
        let owner = Missing::default();

        let mut stream = loader.resource_stream("conf.txt", &owner).unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        assert_eq!(text, "external");
        assert_eq!(owner.calls.load(Ordering::SeqCst), 1);

        let locator = loader.resource("conf.txt", &owner).unwrap();
        assert!(locator.url.ends_with("/conf.txt"));
        assert!(loader.resource("absent.txt", &owner).is_none());
    }

    #[test]
    fn reentrant_class_request_fails_fast() {
        let loader = ExternalLoader::new(Vec::new()).unwrap();
        let signature = loader.signature(LOAD_CLASS, "a.B");
        let _guard = ReentryGuard::enter(&signature).unwrap();

        let owner = Missing::default();
        let err = loader.load_class("a.B", &owner).unwrap_err();
        assert!(matches!(err, LoaderError::Reentrant(_)));
        assert_eq!(owner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn directory_lookups_stay_inside_the_location() {
        let temp = tempfile::tempdir().unwrap();
        let classes = temp.path().join("classes");
        std::fs::create_dir_all(classes.join("conf")).unwrap();
        std::fs::write(classes.join("data.txt"), b"inside").unwrap();
        std::fs::write(temp.path().join("secret.txt"), b"outside").unwrap();
        let loader =
            ExternalLoader::new(vec![ExternalLocation::parse(classes.to_str().unwrap()).unwrap()])
                .unwrap();
        let owner = Missing::default();

        for name in ["/data.txt", "conf/../data.txt", "data.txt"] {
            let mut stream = loader.resource_stream(name, &owner).unwrap();
            let mut text = String::new();
            stream.read_to_string(&mut text).unwrap();
            assert_eq!(text, "inside", "{name}");
        }
        let locator = loader.resource("/data.txt", &owner).unwrap();
        assert!(locator.url.ends_with("/classes/data.txt"));

        for name in ["../secret.txt", "/../secret.txt", "conf/../../secret.txt"] {
            assert!(loader.resource_stream(name, &owner).is_none(), "{name}");
            assert!(loader.resource(name, &owner).is_none(), "{name}");
        }
    }

    #[test]
    fn archive_entry_with_oversized_declared_length_reads_its_data() {
        let temp = tempfile::tempdir().unwrap();
        let jar = temp.path().join("extra.jar");
        let archive = fixtures::inflate_declared_size(
            fixtures::jar(&[("com/ext/Big.class", b"big"), ("com/ext/Ok.class", b"ok")]),
            "com/ext/Big.class",
        );
        std::fs::write(&jar, archive).unwrap();
        let loader =
            ExternalLoader::new(vec![ExternalLocation::parse(jar.to_str().unwrap()).unwrap()])
                .unwrap();
        let owner = Missing::default();

        if let Ok(big) = loader.load_class("com.ext.Big", &owner) {
            assert_eq!(&big.bytes[..], b"big");
        }
        assert_eq!(&loader.load_class("com.ext.Ok", &owner).unwrap().bytes[..], b"ok");
    }
}
