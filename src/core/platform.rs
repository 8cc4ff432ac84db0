// ─── Platform ───
// Host OS / architecture / version tier as seen by the loader.

/// Baseline tier for entries that carry no version override.
pub const BASELINE_TIER: u32 = 8;

/// Lowest platform tier on which versioned overrides are honoured at all.
pub const MIN_VERSIONED_TIER: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsFamily,
    /// Architecture as reported by `std::env::consts::ARCH`.
    pub arch: String,
    /// Major version tier reported by the host runtime, if known.
    pub version_tier: Option<u32>,
}

impl Platform {
    /// Detect OS and architecture. The version tier is host supplied and
    /// starts out unknown.
    pub fn current() -> Self {
        Self {
            os: current_os_family(),
            arch: std::env::consts::ARCH.to_string(),
            version_tier: None,
        }
    }

    pub fn with_version_tier(mut self, tier: u32) -> Self {
        self.version_tier = Some(tier);
        self
    }

    /// Tier used for versioned overrides, or `None` when the platform is too
    /// old (or unknown) for tiering to apply.
    pub fn effective_tier(&self) -> Option<u32> {
        self.version_tier.filter(|tier| *tier >= MIN_VERSIONED_TIER)
    }

    pub fn is_32bit(&self) -> bool {
        matches!(self.arch.as_str(), "x86" | "i386" | "i586" | "i686" | "arm")
    }

    /// Platform file name for a native library (`foo` -> `libfoo.so`).
    pub fn map_library_name(&self, name: &str) -> String {
        match self.os {
            OsFamily::Windows => format!("{name}.dll"),
            OsFamily::MacOs => format!("lib{name}.dylib"),
            OsFamily::Linux => format!("lib{name}.so"),
        }
    }
}

fn current_os_family() -> OsFamily {
    if cfg!(target_os = "windows") {
        OsFamily::Windows
    } else if cfg!(target_os = "macos") {
        OsFamily::MacOs
    } else {
        OsFamily::Linux
    }
}

/// Parse a host runtime version string into a major tier.
///
/// `1.8.0_292` style versions map to their minor number (8), everything else
/// to the leading number (`17.0.2` -> 17).
pub fn parse_version_tier(version: &str) -> Option<u32> {
    let mut parts = version
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .filter(|segment| !segment.is_empty());
    let first = parts.next()?.parse::<u32>().ok()?;
    if first == 1 {
        return parts.next().and_then(|minor| minor.parse::<u32>().ok());
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(os: OsFamily, arch: &str) -> Platform {
        Platform {
            os,
            arch: arch.to_string(),
            version_tier: None,
        }
    }

    #[test]
    fn library_names_follow_platform_conventions() {
        assert_eq!(platform(OsFamily::Linux, "x86_64").map_library_name("foo"), "libfoo.so");
        assert_eq!(platform(OsFamily::Windows, "x86_64").map_library_name("foo"), "foo.dll");
        assert_eq!(
            platform(OsFamily::MacOs, "aarch64").map_library_name("foo"),
            "libfoo.dylib"
        );
    }

    #[test]
    fn tiering_needs_a_modern_platform() {
        let p = platform(OsFamily::Linux, "x86_64");
        assert_eq!(p.effective_tier(), None);
        assert_eq!(p.clone().with_version_tier(8).effective_tier(), None);
        assert_eq!(p.with_version_tier(11).effective_tier(), Some(11));
    }

    #[test]
    fn parses_legacy_and_modern_versions() {
        assert_eq!(parse_version_tier("1.8.0_292"), Some(8));
        assert_eq!(parse_version_tier("17.0.2"), Some(17));
        assert_eq!(parse_version_tier("21"), Some(21));
        assert_eq!(parse_version_tier("garbage"), None);
    }
}
