use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithm::{CompressionAlgorithm, EntryPointKind};
use crate::attributes::COMPTYPE_NONE;
use crate::error::{CompressionError, RegistrationError};
use crate::passthrough::{PassThrough, PASSTHROUGH_PROVIDER};

/// Identifier of a principal (role) in the engine's catalog.
pub type Oid = u32;

/// Principal that owns the built-in algorithms.
pub const BOOTSTRAP_SUPERUSER: Oid = 10;

/// Longest algorithm name the catalog can store.
pub const MAX_NAME_LEN: usize = 63;

/// One persisted row of the compression catalog.
///
/// Entry points are referenced by symbol. They are optional here only so that
/// an incomplete row can be read and then rejected by [`Registry::register`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRow {
    pub compname: String,
    #[serde(default)]
    pub compconstructor: Option<String>,
    #[serde(default)]
    pub compdestructor: Option<String>,
    #[serde(default)]
    pub compcompressor: Option<String>,
    #[serde(default)]
    pub compdecompressor: Option<String>,
    #[serde(default)]
    pub compvalidator: Option<String>,
    pub compowner: Oid,
}

impl RegistryRow {
    /// Row binding `name` to all five entry points published by `provider`.
    pub fn for_provider(name: impl Into<String>, provider: &str, owner: Oid) -> Self {
        Self {
            compname: name.into(),
            compconstructor: Some(EntryPointKind::Constructor.symbol(provider)),
            compdestructor: Some(EntryPointKind::Destructor.symbol(provider)),
            compcompressor: Some(EntryPointKind::Compressor.symbol(provider)),
            compdecompressor: Some(EntryPointKind::Decompressor.symbol(provider)),
            compvalidator: Some(EntryPointKind::Validator.symbol(provider)),
            compowner: owner,
        }
    }

    pub fn entry_point(&self, kind: EntryPointKind) -> Option<&str> {
        let symbol = match kind {
            EntryPointKind::Constructor => &self.compconstructor,
            EntryPointKind::Destructor => &self.compdestructor,
            EntryPointKind::Compressor => &self.compcompressor,
            EntryPointKind::Decompressor => &self.compdecompressor,
            EntryPointKind::Validator => &self.compvalidator,
        };
        symbol.as_deref().filter(|s| !s.is_empty())
    }
}

/// The row describing the built-in `none` algorithm.
pub fn passthrough_row() -> RegistryRow {
    RegistryRow::for_provider(COMPTYPE_NONE, PASSTHROUGH_PROVIDER, BOOTSTRAP_SUPERUSER)
}

/// Entry points available for registration, keyed by provider prefix.
///
/// Stands in for the engine's procedure catalog: a registry row can only name
/// symbols that some implementer in here publishes.
#[derive(Clone)]
pub struct EntryPointCatalog {
    providers: HashMap<&'static str, Arc<dyn CompressionAlgorithm>>,
}

impl EntryPointCatalog {
    /// Catalog holding only the built-in passthrough provider.
    pub fn new() -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn CompressionAlgorithm>> = HashMap::new();
        providers.insert(PASSTHROUGH_PROVIDER, Arc::new(PassThrough));
        Self { providers }
    }

    /// Publish the five entry points of `algorithm`. A provider with the same
    /// prefix is replaced.
    pub fn add(&mut self, algorithm: Arc<dyn CompressionAlgorithm>) -> &mut Self {
        self.providers.insert(algorithm.provider(), algorithm);
        self
    }

    pub fn with(mut self, algorithm: Arc<dyn CompressionAlgorithm>) -> Self {
        self.add(algorithm);
        self
    }

    /// Find the implementer and role behind an entry-point symbol.
    pub fn resolve(&self, symbol: &str) -> Option<(&Arc<dyn CompressionAlgorithm>, EntryPointKind)> {
        EntryPointKind::ALL.iter().find_map(|&kind| {
            let provider = symbol.strip_suffix(kind.suffix())?.strip_suffix('_')?;
            self.providers.get(provider).map(|alg| (alg, kind))
        })
    }

    /// Provider prefixes, sorted.
    pub fn providers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for EntryPointCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntryPointCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointCatalog")
            .field("providers", &self.providers())
            .finish()
    }
}

/// A resolved registry row.
///
/// Read-only once built. Scans resolve an entry once and keep the `Arc` for
/// their whole lifetime so the per-block path never touches the registry.
pub struct RegistryEntry {
    row: RegistryRow,
    algorithm: Arc<dyn CompressionAlgorithm>,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.row.compname
    }

    pub fn owner(&self) -> Oid {
        self.row.compowner
    }

    pub fn row(&self) -> &RegistryRow {
        &self.row
    }

    #[inline]
    pub fn algorithm(&self) -> &dyn CompressionAlgorithm {
        self.algorithm.as_ref()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.row.compname)
            .field("provider", &self.algorithm.provider())
            .field("owner", &self.row.compowner)
            .finish()
    }
}

/// Name → entry map of every registered compression algorithm.
///
/// Registration takes `&mut self` and is expected to finish before the
/// registry is shared (typically behind an `Arc`). Lookups afterwards need no
/// synchronization.
pub struct Registry {
    catalog: EntryPointCatalog,
    entries: HashMap<String, Arc<RegistryEntry>>,
}

impl Registry {
    /// Registry over `catalog`, holding only the built-in `none` entry.
    ///
    /// `none` dispatches to whatever implementer the catalog publishes under
    /// the passthrough provider prefix, like any row naming those symbols.
    pub fn new(catalog: EntryPointCatalog) -> Self {
        let algorithm = catalog
            .providers
            .get(PASSTHROUGH_PROVIDER)
            .cloned()
            .unwrap_or_else(|| Arc::new(PassThrough) as Arc<dyn CompressionAlgorithm>);
        let mut entries = HashMap::new();
        entries.insert(
            COMPTYPE_NONE.to_string(),
            Arc::new(RegistryEntry {
                row: passthrough_row(),
                algorithm,
            }),
        );
        Self { catalog, entries }
    }

    pub fn catalog(&self) -> &EntryPointCatalog {
        &self.catalog
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str) -> Result<Arc<RegistryEntry>, CompressionError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| CompressionError::UnknownAlgorithm {
                name: name.to_string(),
            })
    }

    /// Cheap existence check for DDL parsing.
    pub fn is_valid(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registered row, sorted by name.
    pub fn rows(&self) -> Vec<&RegistryRow> {
        let mut rows: Vec<_> = self.entries.values().map(|e| e.row()).collect();
        rows.sort_by(|a, b| a.compname.cmp(&b.compname));
        rows
    }

    /// Add one algorithm. Rows are immutable once registered and cannot be
    /// removed.
    pub fn register(&mut self, row: RegistryRow) -> Result<Arc<RegistryEntry>, RegistrationError> {
        let entry = Arc::new(self.resolve_row(row)?);
        info!(
            name = entry.name(),
            provider = entry.algorithm.provider(),
            owner = entry.owner(),
            "registered compression algorithm"
        );
        self.entries.insert(entry.name().to_string(), entry.clone());
        Ok(entry)
    }

    /// Register a batch of rows. Either every row is registered or none is.
    pub fn register_all(
        &mut self,
        rows: impl IntoIterator<Item = RegistryRow>,
    ) -> Result<Vec<Arc<RegistryEntry>>, RegistrationError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for row in rows {
            if !seen.insert(row.compname.clone()) {
                return Err(RegistrationError::DuplicateName { name: row.compname });
            }
            resolved.push(Arc::new(self.resolve_row(row)?));
        }
        for entry in &resolved {
            info!(
                name = entry.name(),
                provider = entry.algorithm.provider(),
                owner = entry.owner(),
                "registered compression algorithm"
            );
            self.entries.insert(entry.name().to_string(), entry.clone());
        }
        Ok(resolved)
    }

    /// Register a JSON array of [`RegistryRow`]s.
    pub fn register_json(&mut self, json: &str) -> Result<Vec<Arc<RegistryEntry>>, RegistrationError> {
        let rows: Vec<RegistryRow> =
            serde_json::from_str(json).map_err(|e| RegistrationError::Malformed(e.to_string()))?;
        self.register_all(rows)
    }

    fn resolve_row(&self, row: RegistryRow) -> Result<RegistryEntry, RegistrationError> {
        let name = row.compname.clone();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(RegistrationError::NameTooLong {
                name,
                max: MAX_NAME_LEN,
            });
        }
        if self.entries.contains_key(&name) {
            return Err(RegistrationError::DuplicateName { name });
        }
        if row.compowner == 0 {
            return Err(RegistrationError::InvalidOwner { name });
        }

        let mut algorithm: Option<&Arc<dyn CompressionAlgorithm>> = None;
        for kind in EntryPointKind::ALL {
            let symbol = row
                .entry_point(kind)
                .ok_or_else(|| RegistrationError::MissingEntryPoint {
                    name: name.clone(),
                    column: kind.column(),
                })?;
            let (found, found_kind) =
                self.catalog
                    .resolve(symbol)
                    .ok_or_else(|| RegistrationError::UnresolvedEntryPoint {
                        name: name.clone(),
                        symbol: symbol.to_string(),
                    })?;
            if found_kind != kind {
                return Err(RegistrationError::WrongEntryPointKind {
                    name,
                    symbol: symbol.to_string(),
                    expected: kind.suffix(),
                });
            }
            match algorithm {
                Some(first) if first.provider() != found.provider() => {
                    return Err(RegistrationError::MixedProviders {
                        name,
                        first: first.provider().to_string(),
                        second: found.provider().to_string(),
                    });
                }
                Some(_) => {}
                None => algorithm = Some(found),
            }
        }

        let algorithm = match algorithm {
            Some(alg) => alg.clone(),
            None => {
                return Err(RegistrationError::MissingEntryPoint {
                    name,
                    column: EntryPointKind::Constructor.column(),
                })
            }
        };
        debug!(name = %name, provider = algorithm.provider(), "resolved registry row");
        Ok(RegistryEntry { row, algorithm })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(EntryPointCatalog::new())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("entries", &names)
            .field("catalog", &self.catalog)
            .finish()
    }
}
