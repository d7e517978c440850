use std::fmt;

use serde::Serialize;

use super::datatype::DataTypeId;

/// A named field in a struct type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StructField {
    pub name: String,
    pub ty: StaticType,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: StaticType) -> Self {
        StructField {
            name: name.into(),
            ty,
        }
    }
}

/// Shape of a struct.
///
/// A closed struct contains exactly the listed fields. An open struct may
/// contain fields we don't know about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StructType {
    pub fields: Vec<StructField>,
    pub closed: bool,
}

impl StructType {
    pub fn closed(fields: impl IntoIterator<Item = StructField>) -> Self {
        StructType {
            fields: fields.into_iter().collect(),
            closed: true,
        }
    }

    pub fn open() -> Self {
        StructType {
            fields: Vec::new(),
            closed: false,
        }
    }

    /// Get all fields matching `name`.
    ///
    /// Structs may contain duplicate keys, so more than one field can be
    /// returned.
    pub fn lookup(&self, name: &str, case_sensitive: bool) -> Vec<&StructField> {
        self.fields
            .iter()
            .filter(|f| {
                if case_sensitive {
                    f.name == name
                } else {
                    f.name.eq_ignore_ascii_case(name)
                }
            })
            .collect()
    }
}

/// Compile time type of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StaticType {
    Null,
    Missing,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
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
    Bag(Box<StaticType>),
    List(Box<StaticType>),
    Sexp(Box<StaticType>),
    Struct(StructType),
    Any,
    /// One of several types. Only constructed through [`StaticType::union`].
    AnyOf(Vec<StaticType>),
}

impl StaticType {
    /// Build a union from a set of types.
    ///
    /// Nested unions are flattened, `Any` absorbs everything else, duplicates
    /// are removed, and a single remaining member is returned as is. The
    /// members of the result are sorted so that equal unions compare equal.
    ///
    /// An empty input produces `Missing`.
    pub fn union(types: impl IntoIterator<Item = StaticType>) -> StaticType {
        let mut members = Vec::new();
        for ty in types {
            match ty {
                StaticType::Any => return StaticType::Any,
                StaticType::AnyOf(inner) => members.extend(inner),
                other => members.push(other),
            }
        }

        members.sort();
        members.dedup();

        match members.len() {
            0 => StaticType::Missing,
            1 => members.pop().unwrap_or(StaticType::Missing),
            _ => StaticType::AnyOf(members),
        }
    }

    pub fn bag(element: StaticType) -> Self {
        StaticType::Bag(Box::new(element))
    }

    pub fn list(element: StaticType) -> Self {
        StaticType::List(Box::new(element))
    }

    pub fn sexp(element: StaticType) -> Self {
        StaticType::Sexp(Box::new(element))
    }

    pub fn closed_struct(fields: impl IntoIterator<Item = StructField>) -> Self {
        StaticType::Struct(StructType::closed(fields))
    }

    pub fn open_struct() -> Self {
        StaticType::Struct(StructType::open())
    }

    /// The default static type for a runtime type id.
    pub fn from_type_id(id: DataTypeId) -> Self {
        match id {
            DataTypeId::Null => StaticType::Null,
            DataTypeId::Missing => StaticType::Missing,
            DataTypeId::Bool => StaticType::Bool,
            DataTypeId::Int8 => StaticType::Int8,
            DataTypeId::Int16 => StaticType::Int16,
            DataTypeId::Int32 => StaticType::Int32,
            DataTypeId::Int64 => StaticType::Int64,
            DataTypeId::Int => StaticType::Int,
            DataTypeId::Decimal => StaticType::Decimal,
            DataTypeId::Float32 => StaticType::Float32,
            DataTypeId::Float64 => StaticType::Float64,
            DataTypeId::Char => StaticType::Char,
            DataTypeId::String => StaticType::String,
            DataTypeId::Symbol => StaticType::Symbol,
            DataTypeId::Binary => StaticType::Binary,
            DataTypeId::Byte => StaticType::Byte,
            DataTypeId::Blob => StaticType::Blob,
            DataTypeId::Clob => StaticType::Clob,
            DataTypeId::Date => StaticType::Date,
            DataTypeId::Time => StaticType::Time,
            DataTypeId::Timestamp => StaticType::Timestamp,
            DataTypeId::Interval => StaticType::Interval,
            DataTypeId::Bag => StaticType::bag(StaticType::Any),
            DataTypeId::List => StaticType::list(StaticType::Any),
            DataTypeId::Sexp => StaticType::sexp(StaticType::Any),
            DataTypeId::Struct => StaticType::open_struct(),
            DataTypeId::Any => StaticType::Any,
        }
    }

    /// Runtime type id for this type. Returns None for unions.
    pub fn type_id(&self) -> Option<DataTypeId> {
        Some(match self {
            StaticType::Null => DataTypeId::Null,
            StaticType::Missing => DataTypeId::Missing,
            StaticType::Bool => DataTypeId::Bool,
            StaticType::Int8 => DataTypeId::Int8,
            StaticType::Int16 => DataTypeId::Int16,
            StaticType::Int32 => DataTypeId::Int32,
            StaticType::Int64 => DataTypeId::Int64,
            StaticType::Int => DataTypeId::Int,
            StaticType::Decimal => DataTypeId::Decimal,
            StaticType::Float32 => DataTypeId::Float32,
            StaticType::Float64 => DataTypeId::Float64,
            StaticType::Char => DataTypeId::Char,
            StaticType::String => DataTypeId::String,
            StaticType::Symbol => DataTypeId::Symbol,
            StaticType::Binary => DataTypeId::Binary,
            StaticType::Byte => DataTypeId::Byte,
            StaticType::Blob => DataTypeId::Blob,
            StaticType::Clob => DataTypeId::Clob,
            StaticType::Date => DataTypeId::Date,
            StaticType::Time => DataTypeId::Time,
            StaticType::Timestamp => DataTypeId::Timestamp,
            StaticType::Interval => DataTypeId::Interval,
            StaticType::Bag(_) => DataTypeId::Bag,
            StaticType::List(_) => DataTypeId::List,
            StaticType::Sexp(_) => DataTypeId::Sexp,
            StaticType::Struct(_) => DataTypeId::Struct,
            StaticType::Any => DataTypeId::Any,
            StaticType::AnyOf(_) => return None,
        })
    }

    /// Members of this type. Non-union types are their own single member.
    pub fn members(&self) -> &[StaticType] {
        match self {
            StaticType::AnyOf(members) => members,
            other => std::slice::from_ref(other),
        }
    }

    pub fn admits_missing(&self) -> bool {
        self.members()
            .iter()
            .any(|m| matches!(m, StaticType::Missing | StaticType::Any))
    }

    pub fn admits_null(&self) -> bool {
        self.members()
            .iter()
            .any(|m| matches!(m, StaticType::Null | StaticType::Any))
    }

    /// Remove NULL and MISSING from a union.
    ///
    /// A type made up entirely of NULL and MISSING is returned unchanged.
    pub fn strip_absent(&self) -> StaticType {
        let present: Vec<_> = self
            .members()
            .iter()
            .filter(|m| !matches!(m, StaticType::Null | StaticType::Missing))
            .cloned()
            .collect();
        if present.is_empty() {
            return self.clone();
        }
        StaticType::union(present)
    }

    /// Type of the values produced by iterating over a value of this type.
    ///
    /// Scalars iterate as a single element of themselves.
    pub fn element_type(&self) -> StaticType {
        match self {
            StaticType::Bag(e) | StaticType::List(e) | StaticType::Sexp(e) => e.as_ref().clone(),
            StaticType::AnyOf(members) => {
                StaticType::union(members.iter().map(|m| m.element_type()))
            }
            other => other.clone(),
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            StaticType::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_closed_struct(&self) -> Option<&StructType> {
        self.as_struct().filter(|s| s.closed)
    }

    /// Determine if values of this type are always structs.
    ///
    /// Returns None if it can't be known until run time.
    pub fn is_struct(&self) -> Option<bool> {
        match self {
            StaticType::Any => None,
            StaticType::Struct(_) => Some(true),
            StaticType::AnyOf(members) => {
                let count = members
                    .iter()
                    .filter(|m| matches!(m, StaticType::Struct(_)))
                    .count();
                if count == 0 {
                    Some(false)
                } else if count == members.len() {
                    Some(true)
                } else {
                    None
                }
            }
            _ => Some(false),
        }
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticType::Bag(e) => write!(f, "BAG<{e}>"),
            StaticType::List(e) => write!(f, "LIST<{e}>"),
            StaticType::Sexp(e) => write!(f, "SEXP<{e}>"),
            StaticType::Struct(s) => {
                write!(f, "STRUCT{{")?;
                for (idx, field) in s.fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                if !s.closed {
                    if !s.fields.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "..")?;
                }
                write!(f, "}}")
            }
            StaticType::AnyOf(members) => {
                write!(f, "ANYOF(")?;
                for (idx, m) in members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ")")
            }
            other => match other.type_id() {
                Some(id) => write!(f, "{id}"),
                None => write!(f, "?"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_flattens() {
        let inner = StaticType::union([StaticType::Int32, StaticType::Null]);
        let outer = StaticType::union([inner, StaticType::String]);

        assert_eq!(
            StaticType::AnyOf(vec![StaticType::Null, StaticType::Int32, StaticType::String]),
            outer
        );
    }

    #[test]
    fn union_any_absorbs() {
        let ty = StaticType::union([StaticType::Int32, StaticType::Any, StaticType::Missing]);
        assert_eq!(StaticType::Any, ty);
    }

    #[test]
    fn union_collapses_single_member() {
        let ty = StaticType::union([StaticType::Bool, StaticType::Bool]);
        assert_eq!(StaticType::Bool, ty);
    }

    #[test]
    fn union_order_independent() {
        let a = StaticType::union([StaticType::Int32, StaticType::String]);
        let b = StaticType::union([StaticType::String, StaticType::Int32]);
        assert_eq!(a, b);
    }

    #[test]
    fn admits_missing() {
        assert!(StaticType::Any.admits_missing());
        assert!(StaticType::union([StaticType::Int32, StaticType::Missing]).admits_missing());
        assert!(!StaticType::union([StaticType::Int32, StaticType::Null]).admits_missing());
    }

    #[test]
    fn strip_absent() {
        let ty = StaticType::union([StaticType::Int32, StaticType::Missing, StaticType::Null]);
        assert_eq!(StaticType::Int32, ty.strip_absent());
        assert_eq!(StaticType::Null, StaticType::Null.strip_absent());
    }

    #[test]
    fn is_struct() {
        assert_eq!(Some(true), StaticType::open_struct().is_struct());
        assert_eq!(Some(false), StaticType::Int32.is_struct());
        assert_eq!(None, StaticType::Any.is_struct());
        assert_eq!(
            None,
            StaticType::union([StaticType::open_struct(), StaticType::Int32]).is_struct()
        );
        assert_eq!(
            Some(false),
            StaticType::union([StaticType::String, StaticType::Int32]).is_struct()
        );
    }

    #[test]
    fn element_of_union() {
        let ty = StaticType::union([
            StaticType::bag(StaticType::Int32),
            StaticType::list(StaticType::String),
        ]);
        assert_eq!(
            StaticType::union([StaticType::Int32, StaticType::String]),
            ty.element_type()
        );
    }

    #[test]
    fn display_struct() {
        let ty = StaticType::closed_struct([StructField::new("a", StaticType::Int32)]);
        assert_eq!("STRUCT{a: INT32}", ty.to_string());
        assert_eq!("STRUCT{..}", StaticType::open_struct().to_string());
    }
}
