//! Pluggable block compression for columnar storage.
//!
//! Algorithms are looked up by name in a [`Registry`] of rows that bind a
//! compression type to the five entry points of a [`CompressionAlgorithm`].
//! DDL validates [`StorageAttributes`] once through [`validate`]; scans and
//! writes then resolve the entry once, open a [`ScopedCompression`] per column
//! and direction, and [`actuate`] it once per block.

pub mod actuator;
pub mod algorithm;
pub mod attributes;
pub mod defaults;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod passthrough;
pub mod reader;
pub mod registry;
pub mod state;
pub mod types;
pub mod validator;
pub mod writer;

pub use actuator::actuate;
pub use algorithm::{CompressionAlgorithm, EntryPointKind};
pub use attributes::{Direction, StorageAttributes, DEFAULT_BLOCKSIZE, MAX_BLOCKSIZE, MIN_BLOCKSIZE};
pub use defaults::{default_attributes, is_storage_directive};
pub use error::{AlgorithmError, CompressionError, RegistrationError};
pub use format::{BlockEntry, SegmentHeader, HEADER_SIZE, MAGIC};
pub use lifecycle::{construct, destruct, ScopedCompression};
pub use passthrough::PassThrough;
pub use reader::SegmentReader;
pub use registry::{EntryPointCatalog, Registry, RegistryEntry, RegistryRow};
pub use state::{CompressionState, DesiredSize};
pub use types::{ColumnDesc, TupleDesc, TypeId};
pub use validator::validate;
pub use writer::SegmentWriter;
