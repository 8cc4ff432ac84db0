mod registry;
mod settings;

pub use registry::{
    LocatorFactory, NativeStrategyFactory, StrategyRegistry, FILE_LOCATORS, LEGACY_BINLIB,
    MEMORY_LOCATORS, NEUTRAL_BINLIB,
};
pub use settings::{LoaderSettings, Verbosity};
