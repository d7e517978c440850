use std::fmt;

use serde::Serialize;

use crate::types::DataTypeId;

/// Common view over scalar and aggregate signatures used during resolution.
pub trait Signature: Clone + PartialEq + fmt::Debug + fmt::Display {
    fn name(&self) -> &str;
    fn parameters(&self) -> &[DataTypeId];
    fn returns(&self) -> DataTypeId;
    /// Stable identity of this overload.
    fn specific(&self) -> &str;
    /// If the function itself may produce MISSING.
    fn is_missable(&self) -> bool;
}

/// Signature of a scalar function or operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<DataTypeId>,
    pub returns: DataTypeId,
    /// Returns NULL for some non-NULL input.
    pub is_nullable: bool,
    /// Returns NULL if any argument is NULL.
    pub is_null_call: bool,
    /// Returns MISSING for some non-MISSING input.
    pub is_missable: bool,
    /// Returns MISSING if any argument is MISSING.
    pub is_missing_call: bool,
    pub specific: String,
}

impl FunctionSignature {
    /// Create a signature with default flags. The specific name is derived
    /// from the name and parameter types.
    pub fn new(name: impl Into<String>, parameters: Vec<DataTypeId>, returns: DataTypeId) -> Self {
        let name = name.into();
        let specific = specific_name(&name, &parameters);
        FunctionSignature {
            name,
            parameters,
            returns,
            is_nullable: false,
            is_null_call: true,
            is_missable: false,
            is_missing_call: true,
            specific,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn with_missable(mut self, missable: bool) -> Self {
        self.is_missable = missable;
        self
    }

    /// Don't propagate NULL and MISSING arguments automatically, e.g. for
    /// `is_null`.
    pub fn with_absent_handling(mut self) -> Self {
        self.is_null_call = false;
        self.is_missing_call = false;
        self
    }
}

impl Signature for FunctionSignature {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[DataTypeId] {
        &self.parameters
    }

    fn returns(&self) -> DataTypeId {
        self.returns
    }

    fn specific(&self) -> &str {
        &self.specific
    }

    fn is_missable(&self) -> bool {
        self.is_missable
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_signature(f, &self.name, &self.parameters, self.returns)
    }
}

/// Signature of an aggregate function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AggSignature {
    pub name: String,
    pub parameters: Vec<DataTypeId>,
    pub returns: DataTypeId,
    pub is_nullable: bool,
    /// Can be computed from partial aggregates.
    pub is_decomposable: bool,
    pub specific: String,
}

impl AggSignature {
    pub fn new(name: impl Into<String>, parameters: Vec<DataTypeId>, returns: DataTypeId) -> Self {
        let name = name.into();
        let specific = specific_name(&name, &parameters);
        AggSignature {
            name,
            parameters,
            returns,
            is_nullable: true,
            is_decomposable: true,
            specific,
        }
    }

    pub fn with_decomposable(mut self, decomposable: bool) -> Self {
        self.is_decomposable = decomposable;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }
}

impl Signature for AggSignature {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[DataTypeId] {
        &self.parameters
    }

    fn returns(&self) -> DataTypeId {
        self.returns
    }

    fn specific(&self) -> &str {
        &self.specific
    }

    fn is_missable(&self) -> bool {
        false
    }
}

impl fmt::Display for AggSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_signature(f, &self.name, &self.parameters, self.returns)
    }
}

fn specific_name(name: &str, parameters: &[DataTypeId]) -> String {
    let mut specific = name.to_string();
    for param in parameters {
        specific.push('_');
        specific.push_str(param.name());
    }
    specific
}

fn write_signature(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    parameters: &[DataTypeId],
    returns: DataTypeId,
) -> fmt::Result {
    write!(f, "{name}(")?;
    for (idx, param) in parameters.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{param}")?;
    }
    write!(f, ") -> {returns}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_specific() {
        let sig = FunctionSignature::new(
            "plus",
            vec![DataTypeId::Int32, DataTypeId::Int32],
            DataTypeId::Int32,
        );
        assert_eq!("plus_int32_int32", sig.specific);
        assert_eq!("plus(INT32, INT32) -> INT32", sig.to_string());
    }
}
