// ─── jarnest Core ───
// Class and resource loading straight out of archives nested in one bundle.
//
// Architecture:
//   core/
//     store/       Cached entries + the logical-name entry store
//     ingest/      Bundle layout + one-pass streaming ingestion
//     resolve      Path canonicalization, jar-local then global lookup
//     loader/      JarLoader, host seam, packages, domains, locators,
//                  external overrides, re-entrancy guard, recording
//     native/      Binlib strategies + temp-file materialization
//     config/      Loader settings, verbosity, strategy registry
//     descriptor   Manifest parsing
//     platform     OS / arch / version tier
//     http         Client for remote override locations

pub mod config;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod ingest;
pub mod loader;
pub mod native;
pub mod platform;
pub mod resolve;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;
