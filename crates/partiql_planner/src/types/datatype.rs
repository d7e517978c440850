use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime type identifiers.
///
/// Declaration order is the precedence order used when sorting function
/// signatures. Do not reorder without updating resolution tests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DataTypeId {
    Null,
    Missing,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Arbitrary precision integer.
    Int,
    Decimal,
    Float32,
    Float64,
    Char,
    String,
    Symbol,
    Binary,
    Byte,
    Blob,
    Clob,
    Date,
    Time,
    Timestamp,
    Interval,
    Bag,
    List,
    Sexp,
    Struct,
    Any,
}

impl DataTypeId {
    pub const ALL: [DataTypeId; 27] = [
        DataTypeId::Null,
        DataTypeId::Missing,
        DataTypeId::Bool,
        DataTypeId::Int8,
        DataTypeId::Int16,
        DataTypeId::Int32,
        DataTypeId::Int64,
        DataTypeId::Int,
        DataTypeId::Decimal,
        DataTypeId::Float32,
        DataTypeId::Float64,
        DataTypeId::Char,
        DataTypeId::String,
        DataTypeId::Symbol,
        DataTypeId::Binary,
        DataTypeId::Byte,
        DataTypeId::Blob,
        DataTypeId::Clob,
        DataTypeId::Date,
        DataTypeId::Time,
        DataTypeId::Timestamp,
        DataTypeId::Interval,
        DataTypeId::Bag,
        DataTypeId::List,
        DataTypeId::Sexp,
        DataTypeId::Struct,
        DataTypeId::Any,
    ];

    pub const NUM_TYPES: usize = Self::ALL.len();

    /// Index of this type in lattice tables.
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            DataTypeId::Int8
                | DataTypeId::Int16
                | DataTypeId::Int32
                | DataTypeId::Int64
                | DataTypeId::Int
                | DataTypeId::Decimal
                | DataTypeId::Float32
                | DataTypeId::Float64
        )
    }

    /// Lower case name used when synthesizing function names, e.g.
    /// `cast_int32`.
    pub const fn name(self) -> &'static str {
        match self {
            DataTypeId::Null => "null",
            DataTypeId::Missing => "missing",
            DataTypeId::Bool => "bool",
            DataTypeId::Int8 => "int8",
            DataTypeId::Int16 => "int16",
            DataTypeId::Int32 => "int32",
            DataTypeId::Int64 => "int64",
            DataTypeId::Int => "int",
            DataTypeId::Decimal => "decimal",
            DataTypeId::Float32 => "float32",
            DataTypeId::Float64 => "float64",
            DataTypeId::Char => "char",
            DataTypeId::String => "string",
            DataTypeId::Symbol => "symbol",
            DataTypeId::Binary => "binary",
            DataTypeId::Byte => "byte",
            DataTypeId::Blob => "blob",
            DataTypeId::Clob => "clob",
            DataTypeId::Date => "date",
            DataTypeId::Time => "time",
            DataTypeId::Timestamp => "timestamp",
            DataTypeId::Interval => "interval",
            DataTypeId::Bag => "bag",
            DataTypeId::List => "list",
            DataTypeId::Sexp => "sexp",
            DataTypeId::Struct => "struct",
            DataTypeId::Any => "any",
        }
    }
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_match_all() {
        for (idx, id) in DataTypeId::ALL.iter().enumerate() {
            assert_eq!(idx, id.ordinal(), "{id}");
        }
    }

    #[test]
    fn precedence_order() {
        assert!(DataTypeId::Null < DataTypeId::Missing);
        assert!(DataTypeId::Missing < DataTypeId::Bool);
        assert!(DataTypeId::Int8 < DataTypeId::Int64);
        assert!(DataTypeId::Int < DataTypeId::Decimal);
        assert!(DataTypeId::Float64 < DataTypeId::Char);
        assert!(DataTypeId::Clob < DataTypeId::Date);
        assert!(DataTypeId::Interval < DataTypeId::Bag);
        assert!(DataTypeId::Sexp < DataTypeId::Struct);
        assert!(DataTypeId::Struct < DataTypeId::Any);
    }
}
