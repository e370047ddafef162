use crate::attributes::{Direction, StorageAttributes};
use crate::error::AlgorithmError;
use crate::state::CompressionState;
use crate::types::{TupleDesc, TypeId};

/// The five entry points every compression algorithm provides.
///
/// Implementers are registered through rows naming their entry points (see
/// [`EntryPointKind::symbol`]), never compiled into the dispatch code.
///
/// - Blocks are compressed independently. Whatever an algorithm keeps in its
///   [`CompressionState`] is scratch space or reusable codec context, never
///   data that a later block depends on.
/// - `compress` and `decompress` write into the caller's buffer and return the
///   number of bytes produced. They must not allocate and must fail, rather than
///   truncate, when `dst` is too small.
/// - Errors carry a human-readable reason which reaches the user verbatim.
pub trait CompressionAlgorithm: Send + Sync {
    /// Prefix of the entry-point symbols published by this implementer,
    /// e.g. `gp_zlib` for `gp_zlib_constructor` and friends.
    fn provider(&self) -> &'static str;

    /// Build the per-scan state for one direction.
    fn construct(
        &self,
        tupdesc: &TupleDesc,
        attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError>;

    /// Release a state built by [`construct`](Self::construct).
    fn destruct(&self, state: CompressionState) {
        drop(state);
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError>;

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError>;

    /// Check a proposed configuration at DDL time.
    fn validate(&self, level: i32, blocksize: usize, typid: TypeId) -> Result<(), AlgorithmError>;
}

/// Role of one entry point, matching the five registry row columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPointKind {
    Constructor,
    Destructor,
    Compressor,
    Decompressor,
    Validator,
}

impl EntryPointKind {
    pub const ALL: [EntryPointKind; 5] = [
        EntryPointKind::Constructor,
        EntryPointKind::Destructor,
        EntryPointKind::Compressor,
        EntryPointKind::Decompressor,
        EntryPointKind::Validator,
    ];

    /// Symbol suffix appended to the provider prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            EntryPointKind::Constructor => "constructor",
            EntryPointKind::Destructor => "destructor",
            EntryPointKind::Compressor => "compress",
            EntryPointKind::Decompressor => "decompress",
            EntryPointKind::Validator => "validator",
        }
    }

    /// Registry row column holding this entry point.
    pub fn column(self) -> &'static str {
        match self {
            EntryPointKind::Constructor => "compconstructor",
            EntryPointKind::Destructor => "compdestructor",
            EntryPointKind::Compressor => "compcompressor",
            EntryPointKind::Decompressor => "compdecompressor",
            EntryPointKind::Validator => "compvalidator",
        }
    }

    pub fn symbol(self, provider: &str) -> String {
        format!("{}_{}", provider, self.suffix())
    }
}

/// Copy `src` into the front of `dst`, failing if it does not fit.
///
/// Shared by algorithms that store some blocks verbatim.
#[inline]
pub fn copy_into(src: &[u8], dst: &mut [u8]) -> Result<usize, AlgorithmError> {
    let capacity = dst.len();
    let out = dst.get_mut(..src.len()).ok_or_else(|| {
        AlgorithmError::new(format!(
            "destination holds {} bytes but {} are required",
            capacity,
            src.len()
        ))
    })?;
    out.copy_from_slice(src);
    Ok(src.len())
}
