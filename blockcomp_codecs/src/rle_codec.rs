use blockcomp_core::attributes::effective_level;
use blockcomp_core::{AlgorithmError, CompressionAlgorithm, CompressionState, Direction, StorageAttributes, TupleDesc, TypeId};
use flate2::{Compress, Compression, Decompress};

use crate::zlib_codec::{deflate_bound, deflate_into, inflate_into};

pub const RLE_PROVIDER: &str = "gp_rle_type";

const DEFAULT_LEVEL: i32 = 1;
const MAX_LEVEL: i32 = 4;
const MAX_RUN: usize = u16::MAX as usize;

/// Run-length codec over fixed-width column values.
///
/// Stream layout: `[width: u8]` followed by runs of `[count: u16 LE][value]`.
/// Level 1 stores the run stream as is; levels 2–4 deflate it at zlib level
/// 1, 5 and 9 respectively, staging the run stream in a buffer allocated at
/// construction.
///
/// Only defined for fixed-width types: a value is one `width`-byte slot.
pub struct RleType;

struct RleCompressor {
    width: usize,
    deflate: Option<Compress>,
    scratch: Vec<u8>,
}

struct RleDecompressor {
    width: usize,
    inflate: Option<Decompress>,
    scratch: Vec<u8>,
}

/// Upper bound of the run stream for `n` input bytes: one header byte plus,
/// at worst, a two-byte count for every one-byte value.
fn rle_bound(n: usize) -> usize {
    1 + n.saturating_mul(3)
}

fn rle_desired_sz(input: usize) -> usize {
    deflate_bound(rle_bound(input))
}

fn check_type(typid: TypeId) -> Result<usize, String> {
    match typid.fixed_width() {
        Some(width) if width <= u8::MAX as usize => Ok(width),
        _ => Err(format!(
            "rle_type compression is only supported for fixed-width types, not {}",
            typid
        )),
    }
}

fn check_level(level: i32) -> Result<i32, String> {
    match effective_level(level, DEFAULT_LEVEL) {
        l @ 1..=MAX_LEVEL => Ok(l),
        _ => Err(format!(
            "compresslevel {} is out of range for rle_type (should be between 1 and {})",
            level, MAX_LEVEL
        )),
    }
}

fn deflate_level(level: i32) -> Option<Compression> {
    match level {
        2 => Some(Compression::new(1)),
        3 => Some(Compression::new(5)),
        4 => Some(Compression::new(9)),
        _ => None,
    }
}

fn encode_runs(src: &[u8], width: usize, out: &mut [u8]) -> Result<usize, AlgorithmError> {
    if src.len() % width != 0 {
        return Err(AlgorithmError::new(format!(
            "input of {} bytes is not a whole number of {}-byte values",
            src.len(),
            width
        )));
    }
    let capacity = out.len();
    let overflow = || AlgorithmError::new(format!("run stream does not fit in {} bytes", capacity));

    let header = out.first_mut().ok_or_else(overflow)?;
    *header = width as u8;
    let mut pos = 1;

    let mut values = src.chunks_exact(width);
    let Some(mut current) = values.next() else {
        return Ok(pos);
    };
    let mut run = 1usize;

    let mut emit = |value: &[u8], run: usize, pos: &mut usize| -> Result<(), AlgorithmError> {
        let slot = out.get_mut(*pos..*pos + 2 + width).ok_or_else(overflow)?;
        slot[..2].copy_from_slice(&(run as u16).to_le_bytes());
        slot[2..].copy_from_slice(value);
        *pos += 2 + width;
        Ok(())
    };

    for value in values {
        if value == current && run < MAX_RUN {
            run += 1;
        } else {
            emit(current, run, &mut pos)?;
            current = value;
            run = 1;
        }
    }
    emit(current, run, &mut pos)?;
    Ok(pos)
}

fn decode_runs(src: &[u8], width: usize, out: &mut [u8]) -> Result<usize, AlgorithmError> {
    let (&stream_width, mut rest) = src
        .split_first()
        .ok_or_else(|| AlgorithmError::new("empty rle_type stream"))?;
    if stream_width as usize != width {
        return Err(AlgorithmError::new(format!(
            "rle_type stream holds {}-byte values but the column has {}-byte values",
            stream_width, width
        )));
    }

    let mut pos = 0;
    while !rest.is_empty() {
        if rest.len() < 2 + width {
            return Err(AlgorithmError::new("rle_type stream ends inside a run"));
        }
        let run = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        if run == 0 {
            return Err(AlgorithmError::new("rle_type stream contains an empty run"));
        }
        let value = &rest[2..2 + width];
        let span = out
            .get_mut(pos..pos + run * width)
            .ok_or_else(|| AlgorithmError::new("rle_type runs expand beyond the block"))?;
        for slot in span.chunks_exact_mut(width) {
            slot.copy_from_slice(value);
        }
        pos += run * width;
        rest = &rest[2 + width..];
    }
    Ok(pos)
}

impl CompressionAlgorithm for RleType {
    fn provider(&self) -> &'static str {
        RLE_PROVIDER
    }

    fn construct(
        &self,
        _tupdesc: &TupleDesc,
        attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError> {
        let width = check_type(attrs.typid).map_err(AlgorithmError)?;
        let level = check_level(attrs.complevel).map_err(AlgorithmError)?;
        let compression = deflate_level(level);
        let scratch = match compression {
            Some(_) => vec![0u8; rle_bound(attrs.blocksize)],
            None => Vec::new(),
        };

        Ok(match direction {
            Direction::Compress => CompressionState::new(
                direction,
                rle_desired_sz,
                RleCompressor {
                    width,
                    deflate: compression.map(|c| Compress::new(c, true)),
                    scratch,
                },
            ),
            Direction::Decompress => CompressionState::new(
                direction,
                rle_desired_sz,
                RleDecompressor {
                    width,
                    inflate: compression.map(|_| Decompress::new(true)),
                    scratch,
                },
            ),
        })
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        let RleCompressor {
            width,
            deflate,
            scratch,
        } = state.opaque_mut::<RleCompressor>()?;
        match deflate {
            None => encode_runs(src, *width, dst),
            Some(ctx) => {
                let n = encode_runs(src, *width, scratch)?;
                deflate_into(ctx, &scratch[..n], dst)
            }
        }
    }

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        let RleDecompressor {
            width,
            inflate,
            scratch,
        } = state.opaque_mut::<RleDecompressor>()?;
        match inflate {
            None => decode_runs(src, *width, dst),
            Some(ctx) => {
                let n = inflate_into(ctx, src, scratch)?;
                decode_runs(&scratch[..n], *width, dst)
            }
        }
    }

    fn validate(&self, level: i32, _blocksize: usize, typid: TypeId) -> Result<(), AlgorithmError> {
        check_type(typid).map_err(AlgorithmError)?;
        check_level(level).map_err(AlgorithmError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int4s(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn runs_collapse() {
        let src = int4s(&[7, 7, 7, 7, 9, 9, 7]);
        let mut out = vec![0u8; rle_bound(src.len())];
        let n = encode_runs(&src, 4, &mut out).unwrap();
        // header + three runs of (count + value)
        assert_eq!(n, 1 + 3 * 6);

        let mut back = vec![0u8; src.len()];
        assert_eq!(decode_runs(&out[..n], 4, &mut back).unwrap(), src.len());
        assert_eq!(back, src);
    }

    #[test]
    fn long_runs_split_at_max() {
        let src = vec![0u8; MAX_RUN + 10];
        let mut out = vec![0u8; rle_bound(src.len())];
        let n = encode_runs(&src, 1, &mut out).unwrap();
        assert_eq!(n, 1 + 2 * 3);
        let mut back = vec![1u8; src.len()];
        decode_runs(&out[..n], 1, &mut back).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn partial_value_rejected() {
        let mut out = vec![0u8; 64];
        assert!(encode_runs(&[1, 2, 3], 4, &mut out).is_err());
    }

    #[test]
    fn width_mismatch_rejected() {
        let src = int4s(&[1, 2]);
        let mut out = vec![0u8; 64];
        let n = encode_runs(&src, 4, &mut out).unwrap();
        let mut back = vec![0u8; 64];
        assert!(decode_runs(&out[..n], 8, &mut back).is_err());
    }

    #[test]
    fn variable_length_types_rejected() {
        let err = RleType.validate(0, 8192, TypeId::TEXT).unwrap_err();
        assert!(err.reason().contains("fixed-width"), "{}", err);
        assert!(RleType.validate(0, 8192, TypeId::INT4).is_ok());
        assert!(RleType.validate(5, 8192, TypeId::INT4).is_err());
    }

    #[test]
    fn construct_refuses_variable_length_columns() {
        let attrs = StorageAttributes::new("rle_type", 1, 8192, TypeId::VARCHAR);
        assert!(RleType
            .construct(&TupleDesc::default(), &attrs, Direction::Compress)
            .is_err());
    }
}
