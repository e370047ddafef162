use std::any::Any;
use std::fmt;

use crate::attributes::Direction;
use crate::error::AlgorithmError;

/// Worst-case output length for an input of the given length.
///
/// Pure and deterministic: it depends only on the input length and on the
/// algorithm that supplied it.
pub type DesiredSize = fn(usize) -> usize;

/// Runtime handle produced by an algorithm's constructor.
///
/// Holds algorithm-private data that only the constructing algorithm knows how
/// to interpret. The generic layer hands it back to the same algorithm's
/// compress, decompress and destruct entry points and never looks inside.
///
/// The private data is `Send` but the state is never `Sync`: one state serves
/// one open scan or write on one thread.
pub struct CompressionState {
    desired_sz: DesiredSize,
    direction: Direction,
    opaque: Box<dyn Any + Send>,
}

impl CompressionState {
    pub fn new<T: Any + Send>(direction: Direction, desired_sz: DesiredSize, opaque: T) -> Self {
        Self {
            desired_sz,
            direction,
            opaque: Box::new(opaque),
        }
    }

    /// State for algorithms that keep nothing between blocks.
    pub fn stateless(direction: Direction, desired_sz: DesiredSize) -> Self {
        Self::new(direction, desired_sz, ())
    }

    #[inline]
    pub fn desired_sz(&self, input_len: usize) -> usize {
        (self.desired_sz)(input_len)
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Borrow the private data as the type the algorithm stored.
    ///
    /// Fails only if a state is handed to an algorithm other than the one that
    /// built it, which registration rules out.
    #[inline]
    pub fn opaque_mut<T: Any>(&mut self) -> Result<&mut T, AlgorithmError> {
        self.opaque
            .downcast_mut::<T>()
            .ok_or_else(|| AlgorithmError::new("compression state belongs to a different algorithm"))
    }

    /// Take back ownership of the private data, for destructors.
    pub fn into_opaque<T: Any>(self) -> Result<Box<T>, AlgorithmError> {
        self.opaque
            .downcast::<T>()
            .map_err(|_| AlgorithmError::new("compression state belongs to a different algorithm"))
    }
}

impl fmt::Debug for CompressionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionState")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}
