mod quicklz_codec;
mod rle_codec;
mod snappy_codec;
mod zlib_codec;
mod zstd_codec;

pub use quicklz_codec::{QuickLz, QUICKLZ_PROVIDER};
pub use rle_codec::{RleType, RLE_PROVIDER};
pub use snappy_codec::{Snappy, SNAPPY_PROVIDER};
pub use zlib_codec::{Zlib, ZLIB_PROVIDER};
pub use zstd_codec::{zstd_row, Zstd, ZSTD_PROVIDER};

use std::sync::Arc;

use blockcomp_core::registry::BOOTSTRAP_SUPERUSER;
use blockcomp_core::{EntryPointCatalog, RegistrationError, Registry, RegistryRow};
use tracing::info;

/// Every implementer shipped in this crate, plus the built-in passthrough.
///
/// Publishing an implementer here only makes its entry points nameable; it
/// is usable by name once a registry row refers to it.
pub fn entry_point_catalog() -> EntryPointCatalog {
    EntryPointCatalog::new()
        .with(Arc::new(Snappy))
        .with(Arc::new(Zlib))
        .with(Arc::new(QuickLz))
        .with(Arc::new(RleType))
        .with(Arc::new(Zstd))
}

/// Seed rows inserted at startup. `none` is built into every registry and is
/// not repeated here.
pub fn seed_rows() -> Vec<RegistryRow> {
    vec![
        RegistryRow::for_provider("snappy", SNAPPY_PROVIDER, BOOTSTRAP_SUPERUSER),
        RegistryRow::for_provider("zlib", ZLIB_PROVIDER, BOOTSTRAP_SUPERUSER),
        RegistryRow::for_provider("quicklz", QUICKLZ_PROVIDER, BOOTSTRAP_SUPERUSER),
        RegistryRow::for_provider("rle_type", RLE_PROVIDER, BOOTSTRAP_SUPERUSER),
    ]
}

/// Register the seed rows into `registry`.
pub fn seed(registry: &mut Registry) -> Result<(), RegistrationError> {
    let entries = registry.register_all(seed_rows())?;
    info!(count = entries.len(), "seeded compression registry");
    Ok(())
}

/// Registry over [`entry_point_catalog`] holding the five built-in algorithms.
pub fn builtin_registry() -> Result<Registry, RegistrationError> {
    let mut registry = Registry::new(entry_point_catalog());
    seed(&mut registry)?;
    Ok(registry)
}
