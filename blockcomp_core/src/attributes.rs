use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TypeId;

/// Smallest block size the engine accepts, and the block size granularity.
pub const MIN_BLOCKSIZE: usize = 8 * 1024;

/// Largest block size the engine accepts: 2 MB.
pub const MAX_BLOCKSIZE: usize = 2 * 1024 * 1024;

/// Block size used when a column or table does not specify one: 32 KB.
pub const DEFAULT_BLOCKSIZE: usize = 32 * 1024;

/// Compression type of the built-in passthrough algorithm.
pub const COMPTYPE_NONE: &str = "none";

/// Which way a compression state transforms blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Compress,
    Decompress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Compress => f.write_str("compress"),
            Direction::Decompress => f.write_str("decompress"),
        }
    }
}

/// Persisted compression configuration of one column.
///
/// Validated once when the column is created or altered. Scans trust what was
/// persisted and never validate it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAttributes {
    /// `compresstype` option: a registered algorithm name.
    pub comptype: String,
    /// `compresslevel` option. Zero selects the algorithm's default level.
    pub complevel: i32,
    /// `blocksize` option, in bytes of raw data per block.
    pub blocksize: usize,
    /// Logical type of the column being compressed.
    pub typid: TypeId,
}

impl StorageAttributes {
    pub fn new(comptype: impl Into<String>, complevel: i32, blocksize: usize, typid: TypeId) -> Self {
        Self {
            comptype: comptype.into(),
            complevel,
            blocksize,
            typid,
        }
    }

    pub fn with_type(mut self, typid: TypeId) -> Self {
        self.typid = typid;
        self
    }

    pub fn is_passthrough(&self) -> bool {
        self.comptype == COMPTYPE_NONE
    }
}

impl Default for StorageAttributes {
    fn default() -> Self {
        crate::defaults::default_attributes()
    }
}

/// Resolve a level of zero to `default`, leaving explicit levels untouched.
#[inline]
pub fn effective_level(level: i32, default: i32) -> i32 {
    if level == 0 {
        default
    } else {
        level
    }
}
