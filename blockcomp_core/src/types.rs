use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a column's logical type.
///
/// Values follow the engine's type catalog numbering. Validators use
/// [`TypeId::fixed_width`] to restrict codecs to fixed-width types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const INVALID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(16);
    pub const BYTEA: TypeId = TypeId(17);
    pub const CHAR: TypeId = TypeId(18);
    pub const INT8: TypeId = TypeId(20);
    pub const INT2: TypeId = TypeId(21);
    pub const INT4: TypeId = TypeId(23);
    pub const TEXT: TypeId = TypeId(25);
    pub const OID: TypeId = TypeId(26);
    pub const FLOAT4: TypeId = TypeId(700);
    pub const FLOAT8: TypeId = TypeId(701);
    pub const BPCHAR: TypeId = TypeId(1042);
    pub const VARCHAR: TypeId = TypeId(1043);
    pub const DATE: TypeId = TypeId(1082);
    pub const TIME: TypeId = TypeId(1083);
    pub const TIMESTAMP: TypeId = TypeId(1114);
    pub const TIMESTAMPTZ: TypeId = TypeId(1184);
    pub const NUMERIC: TypeId = TypeId(1700);

    const KNOWN: &'static [(TypeId, &'static str, Option<usize>)] = &[
        (TypeId::BOOL, "bool", Some(1)),
        (TypeId::BYTEA, "bytea", None),
        (TypeId::CHAR, "char", Some(1)),
        (TypeId::INT8, "int8", Some(8)),
        (TypeId::INT2, "int2", Some(2)),
        (TypeId::INT4, "int4", Some(4)),
        (TypeId::TEXT, "text", None),
        (TypeId::OID, "oid", Some(4)),
        (TypeId::FLOAT4, "float4", Some(4)),
        (TypeId::FLOAT8, "float8", Some(8)),
        (TypeId::BPCHAR, "bpchar", None),
        (TypeId::VARCHAR, "varchar", None),
        (TypeId::DATE, "date", Some(4)),
        (TypeId::TIME, "time", Some(8)),
        (TypeId::TIMESTAMP, "timestamp", Some(8)),
        (TypeId::TIMESTAMPTZ, "timestamptz", Some(8)),
        (TypeId::NUMERIC, "numeric", None),
    ];

    fn known(self) -> Option<&'static (TypeId, &'static str, Option<usize>)> {
        Self::KNOWN.iter().find(|(id, _, _)| *id == self)
    }

    /// Byte width of one value, or `None` for variable-length and unknown types.
    pub fn fixed_width(self) -> Option<usize> {
        self.known().and_then(|(_, _, width)| *width)
    }

    pub fn name(self) -> Option<&'static str> {
        self.known().map(|(_, name, _)| *name)
    }

    /// Resolve a type by catalog name, accepting the common SQL aliases.
    pub fn from_name(name: &str) -> Option<TypeId> {
        let canonical = match name.to_ascii_lowercase().as_str() {
            "boolean" => "bool",
            "smallint" => "int2",
            "integer" | "int" => "int4",
            "bigint" => "int8",
            "real" => "float4",
            "double precision" | "double" => "float8",
            "character varying" => "varchar",
            "character" => "bpchar",
            "decimal" => "numeric",
            other => return Self::KNOWN.iter().find(|(_, n, _)| *n == other).map(|(id, _, _)| *id),
        };
        Self::KNOWN
            .iter()
            .find(|(_, n, _)| *n == canonical)
            .map(|(id, _, _)| *id)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "type {}", self.0),
        }
    }
}

/// One attribute of a [`TupleDesc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub typid: TypeId,
}

/// Physical layout of the tuples whose columns are being compressed.
///
/// Handed to constructors alongside the storage attributes. Most algorithms
/// ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleDesc {
    pub columns: Vec<ColumnDesc>,
}

impl TupleDesc {
    pub fn new(columns: Vec<ColumnDesc>) -> Self {
        Self { columns }
    }

    /// Descriptor for a single column, which is what a column-oriented scan opens.
    pub fn single(name: impl Into<String>, typid: TypeId) -> Self {
        Self {
            columns: vec![ColumnDesc {
                name: name.into(),
                typid,
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
