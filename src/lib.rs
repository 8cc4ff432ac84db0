pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::{LoaderSettings, StrategyRegistry, Verbosity};
pub use crate::core::error::{LoaderError, LoaderResult};
pub use crate::core::ingest::IngestReport;
pub use crate::core::loader::{ClassSource, DefinedClass, JarLoader, JarLoaderBuilder, Locator};
pub use crate::core::platform::Platform;

/// Install the global subscriber. `RUST_LOG` wins over `verbosity`; a second
/// call is a no-op.
pub fn init_tracing(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive())),
        )
        .try_init();
}
