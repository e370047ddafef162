//! Engine-wide default encoding and the storage-encoding option namespace.

use crate::attributes::{StorageAttributes, COMPTYPE_NONE, DEFAULT_BLOCKSIZE};
use crate::error::CompressionError;
use crate::types::TypeId;

pub const OPT_COMPRESSTYPE: &str = "compresstype";
pub const OPT_COMPRESSLEVEL: &str = "compresslevel";
pub const OPT_BLOCKSIZE: &str = "blocksize";

/// Compression type implied by a `compresslevel` given without a `compresstype`.
pub const IMPLIED_COMPTYPE: &str = "zlib";

const STORAGE_DIRECTIVES: [&str; 3] = [OPT_COMPRESSTYPE, OPT_COMPRESSLEVEL, OPT_BLOCKSIZE];

/// Attributes applied when a column or table names no compression options.
pub fn default_attributes() -> StorageAttributes {
    StorageAttributes {
        comptype: COMPTYPE_NONE.to_string(),
        complevel: 0,
        blocksize: DEFAULT_BLOCKSIZE,
        typid: TypeId::INVALID,
    }
}

/// Whether `name` is a storage-encoding option rather than a general table option.
pub fn is_storage_directive(name: &str) -> bool {
    STORAGE_DIRECTIVES.iter().any(|d| d.eq_ignore_ascii_case(name))
}

/// The default encoding spelled out as DDL options.
pub fn default_column_encoding_clause() -> Vec<(String, String)> {
    let attrs = default_attributes();
    vec![
        (OPT_COMPRESSTYPE.to_string(), attrs.comptype),
        (OPT_COMPRESSLEVEL.to_string(), attrs.complevel.to_string()),
        (OPT_BLOCKSIZE.to_string(), attrs.blocksize.to_string()),
    ]
}

/// Partition options into `(storage directives, everything else)`, keeping order.
pub fn split_storage_options<K, V>(options: impl IntoIterator<Item = (K, V)>) -> (Vec<(K, V)>, Vec<(K, V)>)
where
    K: AsRef<str>,
{
    options
        .into_iter()
        .partition(|(key, _)| is_storage_directive(key.as_ref()))
}

/// Build storage attributes for a column of type `typid` from DDL options.
///
/// Starts from [`default_attributes`] and applies every storage directive;
/// other options are ignored. A non-zero `compresslevel` without a
/// `compresstype` implies [`IMPLIED_COMPTYPE`]. The result still has to go
/// through [`validate`](crate::validator::validate).
pub fn attributes_from_options<K, V>(
    options: impl IntoIterator<Item = (K, V)>,
    typid: TypeId,
) -> Result<StorageAttributes, CompressionError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut attrs = default_attributes().with_type(typid);
    let mut comptype_given = false;
    let mut level_given = false;
    // First unparseable (option, value); reported once the algorithm is known.
    let mut rejected: Option<(&str, String)> = None;

    for (key, value) in options {
        let (key, value) = (key.as_ref(), value.as_ref().trim());
        if key.eq_ignore_ascii_case(OPT_COMPRESSTYPE) {
            attrs.comptype = value.to_string();
            comptype_given = true;
        } else if key.eq_ignore_ascii_case(OPT_COMPRESSLEVEL) {
            level_given = true;
            match value.parse() {
                Ok(level) => attrs.complevel = level,
                Err(_) => {
                    rejected.get_or_insert((OPT_COMPRESSLEVEL, value.to_string()));
                }
            }
        } else if key.eq_ignore_ascii_case(OPT_BLOCKSIZE) {
            match value.parse() {
                Ok(blocksize) => attrs.blocksize = blocksize,
                Err(_) => {
                    rejected.get_or_insert((OPT_BLOCKSIZE, value.to_string()));
                }
            }
        }
    }

    if !comptype_given && level_given && (attrs.complevel != 0 || rejected.is_some()) {
        attrs.comptype = IMPLIED_COMPTYPE.to_string();
    }
    if let Some((option, value)) = rejected {
        return Err(CompressionError::InvalidConfig {
            algorithm: attrs.comptype,
            reason: format!("invalid value for {}: \"{}\"", option, value),
        });
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_passthrough() {
        let attrs = default_attributes();
        assert_eq!(attrs.comptype, "none");
        assert_eq!(attrs.complevel, 0);
        assert_eq!(attrs.blocksize, DEFAULT_BLOCKSIZE);
        assert_eq!(StorageAttributes::default(), attrs);
    }

    #[test]
    fn storage_directives() {
        assert!(is_storage_directive("compresstype"));
        assert!(is_storage_directive("COMPRESSLEVEL"));
        assert!(is_storage_directive("blocksize"));
        assert!(!is_storage_directive("appendonly"));
        assert!(!is_storage_directive("fillfactor"));
    }

    #[test]
    fn encoding_clause_matches_defaults() {
        let clause = default_column_encoding_clause();
        let attrs = attributes_from_options(clause.clone(), TypeId::INT4).unwrap();
        assert_eq!(attrs, default_attributes().with_type(TypeId::INT4));
        assert!(clause.iter().all(|(k, _)| is_storage_directive(k)));
    }

    #[test]
    fn split_keeps_order() {
        let options = vec![
            ("appendonly", "true"),
            ("compresstype", "zlib"),
            ("orientation", "column"),
            ("blocksize", "65536"),
        ];
        let (storage, other) = split_storage_options(options);
        assert_eq!(storage, vec![("compresstype", "zlib"), ("blocksize", "65536")]);
        assert_eq!(other, vec![("appendonly", "true"), ("orientation", "column")]);
    }

    #[test]
    fn options_override_defaults() {
        let attrs = attributes_from_options(
            [("compresstype", "snappy"), ("blocksize", "65536"), ("appendonly", "true")],
            TypeId::TEXT,
        )
        .unwrap();
        assert_eq!(attrs, StorageAttributes::new("snappy", 0, 65536, TypeId::TEXT));
    }

    #[test]
    fn level_alone_implies_zlib() {
        let attrs = attributes_from_options([("compresslevel", "5")], TypeId::INT4).unwrap();
        assert_eq!(attrs.comptype, "zlib");
        assert_eq!(attrs.complevel, 5);
    }

    #[test]
    fn parse_errors_name_the_requested_algorithm() {
        let err = attributes_from_options([("compresslevel", "high"), ("compresstype", "snappy")], TypeId::INT4)
            .unwrap_err();
        assert_eq!(
            err,
            CompressionError::InvalidConfig {
                algorithm: "snappy".to_string(),
                reason: "invalid value for compresslevel: \"high\"".to_string(),
            }
        );

        let err = attributes_from_options([("blocksize", "big"), ("compresstype", "rle_type")], TypeId::INT4)
            .unwrap_err();
        assert!(matches!(err, CompressionError::InvalidConfig { ref algorithm, .. } if algorithm == "rle_type"));
    }

    #[test]
    fn non_numeric_level_rejected() {
        let err = attributes_from_options([("compresslevel", "high")], TypeId::INT4).unwrap_err();
        assert!(matches!(err, CompressionError::InvalidConfig { .. }));
        assert!(err.to_string().contains("compresslevel"));
    }
}
