mod ingestor;
mod layout;

pub use ingestor::{split_versioned, ArchiveIngestor, IngestReport, VERSIONED_PREFIX};
pub use layout::{BundleLayout, EntryKind, DEFAULT_LIB_PREFIX, MAIN_PREFIX};
