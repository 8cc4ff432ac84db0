mod materializer;
mod strategy;

pub use materializer::NativeLibraryMaterializer;
pub use strategy::{LegacyBinlibResolver, NativePathStrategy, NeutralBinlibResolver, BINLIB_PREFIX};
