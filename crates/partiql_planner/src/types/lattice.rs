use partiql_error::{PartiqlError, Result};
use serde::Serialize;

use super::datatype::DataTypeId;

/// Classification of a cast between two types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CastKind {
    /// May be inserted by the planner without being asked.
    Implicit,
    /// Requires an explicit CAST, never loses information.
    ExplicitLossless,
    /// Requires an explicit CAST, may fail or lose information at run time.
    ExplicitLossy,
}

use CastKind::*;

const NUMERICS: [DataTypeId; 8] = [
    DataTypeId::Int8,
    DataTypeId::Int16,
    DataTypeId::Int32,
    DataTypeId::Int64,
    DataTypeId::Int,
    DataTypeId::Decimal,
    DataTypeId::Float32,
    DataTypeId::Float64,
];

const TEXT: [DataTypeId; 3] = [DataTypeId::Char, DataTypeId::String, DataTypeId::Symbol];

const TEMPORAL: [DataTypeId; 3] = [DataTypeId::Date, DataTypeId::Time, DataTypeId::Timestamp];

/// Cast relationships between every pair of runtime types.
///
/// Stored as a square matrix indexed by type ordinal. A `None` cell means no
/// cast exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLattice {
    cells: Vec<Option<CastKind>>,
}

impl TypeLattice {
    pub fn try_new() -> Result<Self> {
        let mut cells = vec![None; DataTypeId::NUM_TYPES * DataTypeId::NUM_TYPES];

        for from in DataTypeId::ALL {
            for (to, kind) in relationships(from) {
                let idx = Self::index(from, to);
                if let Some(existing) = cells[idx] {
                    return Err(PartiqlError::new("Duplicate cast relationship")
                        .with_field("from", from)
                        .with_field("to", to)
                        .with_field("existing", format!("{existing:?}")));
                }
                cells[idx] = Some(kind);
            }
        }

        for ty in DataTypeId::ALL {
            if cells[Self::index(ty, ty)] != Some(Implicit) {
                return Err(
                    PartiqlError::new("Type lattice missing reflexive cast").with_field("type", ty)
                );
            }
        }

        Ok(TypeLattice { cells })
    }

    const fn index(from: DataTypeId, to: DataTypeId) -> usize {
        from.ordinal() * DataTypeId::NUM_TYPES + to.ordinal()
    }

    pub fn classify(&self, from: DataTypeId, to: DataTypeId) -> Option<CastKind> {
        self.cells[Self::index(from, to)]
    }

    /// If a value of `from` can be implicitly coerced to `to`.
    pub fn can_coerce(&self, from: DataTypeId, to: DataTypeId) -> bool {
        self.classify(from, to) == Some(Implicit)
    }

    /// All non-reflexive implicit casts.
    pub fn implicit_casts(&self) -> Vec<(DataTypeId, DataTypeId)> {
        self.edges()
            .filter(|(from, to, kind)| from != to && *kind == Implicit)
            .map(|(from, to, _)| (from, to))
            .collect()
    }

    /// Iterate every relationship in the lattice, reflexive cells included.
    ///
    /// Ordered by source type, then target type.
    pub fn edges(&self) -> impl Iterator<Item = (DataTypeId, DataTypeId, CastKind)> + '_ {
        DataTypeId::ALL.into_iter().flat_map(move |from| {
            DataTypeId::ALL
                .into_iter()
                .filter_map(move |to| self.classify(from, to).map(|kind| (from, to, kind)))
        })
    }
}

/// Adjacency list for a single type.
fn relationships(from: DataTypeId) -> Vec<(DataTypeId, CastKind)> {
    let mut out = vec![(from, Implicit)];

    match from {
        DataTypeId::Null | DataTypeId::Missing | DataTypeId::Any => (),
        DataTypeId::Bool => {
            out.extend(NUMERICS.iter().map(|&t| (t, ExplicitLossless)));
            out.extend(TEXT.iter().map(|&t| (t, ExplicitLossless)));
        }
        t if t.is_numeric() => {
            // Numerics are declared narrowest to widest.
            for other in NUMERICS {
                if other == from {
                    continue;
                }
                let kind = if other > from { Implicit } else { ExplicitLossy };
                out.push((other, kind));
            }
            out.push((DataTypeId::Bool, ExplicitLossy));
            out.extend(TEXT.iter().map(|&t| (t, ExplicitLossless)));
        }
        DataTypeId::Char | DataTypeId::String | DataTypeId::Symbol => {
            for other in TEXT {
                if other == from {
                    continue;
                }
                let kind = match (from, other) {
                    (_, DataTypeId::Char) => ExplicitLossy,
                    _ => Implicit,
                };
                out.push((other, kind));
            }
            out.push((DataTypeId::Bool, ExplicitLossy));
            out.extend(NUMERICS.iter().map(|&t| (t, ExplicitLossy)));
            out.extend(TEMPORAL.iter().map(|&t| (t, ExplicitLossy)));
            out.push((DataTypeId::Clob, ExplicitLossless));
        }
        DataTypeId::Byte => {
            out.push((DataTypeId::Binary, Implicit));
            out.push((DataTypeId::Blob, Implicit));
        }
        DataTypeId::Binary => out.push((DataTypeId::Blob, Implicit)),
        DataTypeId::Blob => out.push((DataTypeId::Binary, ExplicitLossless)),
        DataTypeId::Clob => out.push((DataTypeId::String, ExplicitLossless)),
        DataTypeId::Date => {
            out.push((DataTypeId::Timestamp, Implicit));
            out.extend(TEXT.iter().map(|&t| (t, ExplicitLossless)));
        }
        DataTypeId::Time => out.extend(TEXT.iter().map(|&t| (t, ExplicitLossless))),
        DataTypeId::Timestamp => {
            out.push((DataTypeId::Date, ExplicitLossy));
            out.push((DataTypeId::Time, ExplicitLossy));
            out.extend(TEXT.iter().map(|&t| (t, ExplicitLossless)));
        }
        DataTypeId::List => {
            out.push((DataTypeId::Bag, Implicit));
            out.push((DataTypeId::Sexp, ExplicitLossless));
        }
        DataTypeId::Sexp => {
            out.push((DataTypeId::Bag, Implicit));
            out.push((DataTypeId::List, ExplicitLossless));
        }
        // Interval, bag and struct only cast to themselves.
        _ => (),
    }

    out
}
