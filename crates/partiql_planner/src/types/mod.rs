pub mod datatype;
pub mod lattice;
pub mod static_type;

pub use datatype::DataTypeId;
pub use lattice::{CastKind, TypeLattice};
pub use static_type::{StaticType, StructField, StructType};
