use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{LoaderError, LoaderResult};
use crate::core::loader::DEFAULT_RECORDING_DIR;

const PROPERTY_PREFIX: &str = "jarnest.";
const ENV_PREFIX: &str = "JARNEST_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Silent,
    #[default]
    Info,
    Verbose,
}

impl Verbosity {
    /// Default `EnvFilter` directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Verbosity::Silent => "off",
            Verbosity::Info => "info",
            Verbosity::Verbose => "info,jarnest=debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Write every class defined from the store to `recording_dir`.
    pub record: bool,
    pub recording_dir: PathBuf,
    /// Record without per-origin sub-directories.
    pub flatten: bool,
    pub verbosity: Verbosity,
    /// `|`-separated external override locations.
    pub class_path: Option<String>,
    /// Where native libraries are extracted.
    pub expand_dir: Option<PathBuf>,
    /// Locator strategy name (`file`, `memory`).
    pub locator: Option<String>,
    /// Native path strategy name (`legacy`, `neutral`).
    pub binlib_resolver: Option<String>,
    pub lib_prefix: Option<String>,
    pub wrap_prefix: Option<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            record: false,
            recording_dir: PathBuf::from(DEFAULT_RECORDING_DIR),
            flatten: true,
            verbosity: Verbosity::Info,
            class_path: None,
            expand_dir: None,
            locator: None,
            binlib_resolver: None,
            lib_prefix: None,
            wrap_prefix: None,
        }
    }
}

impl LoaderSettings {
    /// Build settings from `jarnest.*` properties. Other keys are ignored.
    ///
    /// Later verbosity keys win over earlier ones; `jar.names` always turns
    /// recording on without flattening.
    pub fn from_properties<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        let mut jar_names = false;

        for (key, value) in properties {
            let Some(key) = key.as_ref().strip_prefix(PROPERTY_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();

            match key {
                "record" => match parse_flag(value) {
                    Some(enabled) => settings.record = enabled,
                    None => {
                        settings.record = true;
                        settings.recording_dir = PathBuf::from(value);
                    }
                },
                "jar.names" => jar_names = parse_flag(value).unwrap_or(true),
                "verbose" if parse_flag(value).unwrap_or(true) => {
                    settings.verbosity = Verbosity::Verbose
                }
                "info" if parse_flag(value).unwrap_or(true) => settings.verbosity = Verbosity::Info,
                "silent" if parse_flag(value).unwrap_or(true) => {
                    settings.verbosity = Verbosity::Silent
                }
                "class.path" => settings.class_path = non_empty(value),
                "expand.dir" => settings.expand_dir = non_empty(value).map(PathBuf::from),
                "locator" => settings.locator = non_empty(value),
                "binlib.resolver" => settings.binlib_resolver = non_empty(value),
                "lib.prefix" => settings.lib_prefix = non_empty(value),
                "wrap.prefix" => settings.wrap_prefix = non_empty(value),
                "verbose" | "info" | "silent" => {}
                other => warn!("Unknown setting {}{}", PROPERTY_PREFIX, other),
            }
        }

        if jar_names {
            settings.record = true;
            settings.flatten = false;
        }
        settings
    }

    /// Read `JARNEST_*` variables (`JARNEST_CLASS_PATH` -> `jarnest.class.path`).
    pub fn from_env() -> Self {
        Self::from_properties(std::env::vars().filter_map(|(key, value)| {
            let name = key.strip_prefix(ENV_PREFIX)?;
            let property = format!("{PROPERTY_PREFIX}{}", name.to_ascii_lowercase().replace('_', "."));
            Some((property, value))
        }))
    }

    /// Load a JSON settings file.
    pub fn load(path: &Path) -> LoaderResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| LoaderError::io(path, source))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> LoaderResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| LoaderError::io(path, source))
    }

    /// Parsed external override path, `None` when unset.
    pub fn class_path(&self) -> Option<&str> {
        self.class_path.as_deref().filter(|path| !path.trim().is_empty())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
