use std::fmt;

use crate::core::platform::{OsFamily, Platform};

/// Architecture-neutral storage prefix for native libraries.
pub const BINLIB_PREFIX: &str = "binlib/";

/// Maps the host platform onto the storage prefix native libraries are
/// bundled under.
pub trait NativePathStrategy: Send + Sync + fmt::Debug {
    /// Prefix (ending in `/`) to search before [`BINLIB_PREFIX`], if any.
    fn prefix(&self, platform: &Platform) -> Option<String>;
}

/// `binlib/<os><bits>/` directories: `macosx`, `windows32`, `windows64`,
/// `linux32`, `linux64`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyBinlibResolver;

impl NativePathStrategy for LegacyBinlibResolver {
    fn prefix(&self, platform: &Platform) -> Option<String> {
        let bits = if platform.is_32bit() { "32" } else { "64" };
        let dir = match platform.os {
            OsFamily::MacOs => "macosx".to_string(),
            OsFamily::Windows => format!("windows{bits}"),
            OsFamily::Linux => format!("linux{bits}"),
        };
        Some(format!("{BINLIB_PREFIX}{dir}/"))
    }
}

/// Everything lives directly under `binlib/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralBinlibResolver;

impl NativePathStrategy for NeutralBinlibResolver {
    fn prefix(&self, _platform: &Platform) -> Option<String> {
        Some(BINLIB_PREFIX.to_string())
    }
}
