mod entry;
mod entry_store;

pub use entry::{class_entry_name, digest_hex, CachedEntry, CLASS_SUFFIX};
pub use entry_store::EntryStore;
