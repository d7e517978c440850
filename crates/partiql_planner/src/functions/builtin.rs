//! Builtin operator, function and aggregate signatures.

use super::signature::{AggSignature, FunctionSignature};
use crate::types::DataTypeId;

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

const COMPARABLE: [DataTypeId; 13] = [
    DataTypeId::Int8,
    DataTypeId::Int16,
    DataTypeId::Int32,
    DataTypeId::Int64,
    DataTypeId::Int,
    DataTypeId::Decimal,
    DataTypeId::Float32,
    DataTypeId::Float64,
    DataTypeId::String,
    DataTypeId::Symbol,
    DataTypeId::Date,
    DataTypeId::Time,
    DataTypeId::Timestamp,
];

const COLLECTIONS: [DataTypeId; 3] = [DataTypeId::Bag, DataTypeId::List, DataTypeId::Sexp];

/// Functions backing operator syntax, e.g. `a + b` or `a IS NULL`.
pub fn builtin_operators() -> Vec<FunctionSignature> {
    let mut sigs = Vec::new();

    sigs.push(FunctionSignature::new("not", vec![DataTypeId::Bool], DataTypeId::Bool));
    for op in ["and", "or"] {
        sigs.push(
            FunctionSignature::new(op, vec![DataTypeId::Bool, DataTypeId::Bool], DataTypeId::Bool)
                .with_nullable(true),
        );
    }

    for t in NUMERICS {
        sigs.push(FunctionSignature::new("pos", vec![t], t));
        sigs.push(FunctionSignature::new("neg", vec![t], t));
        for op in ["plus", "minus", "times"] {
            sigs.push(FunctionSignature::new(op, vec![t, t], t));
        }
        // Division by zero.
        for op in ["divide", "modulo"] {
            sigs.push(FunctionSignature::new(op, vec![t, t], t).with_missable(true));
        }
    }

    sigs.push(FunctionSignature::new(
        "concat",
        vec![DataTypeId::String, DataTypeId::String],
        DataTypeId::String,
    ));

    for op in ["eq", "ne"] {
        sigs.push(FunctionSignature::new(
            op,
            vec![DataTypeId::Any, DataTypeId::Any],
            DataTypeId::Bool,
        ));
    }

    for t in COMPARABLE {
        for op in ["lt", "lte", "gt", "gte"] {
            sigs.push(FunctionSignature::new(op, vec![t, t], DataTypeId::Bool));
        }
        sigs.push(FunctionSignature::new("between", vec![t, t, t], DataTypeId::Bool));
    }

    sigs.push(FunctionSignature::new(
        "like",
        vec![DataTypeId::String, DataTypeId::String],
        DataTypeId::Bool,
    ));
    // Invalid escape sequences.
    sigs.push(
        FunctionSignature::new(
            "like",
            vec![DataTypeId::String, DataTypeId::String, DataTypeId::String],
            DataTypeId::Bool,
        )
        .with_missable(true),
    );

    for t in COLLECTIONS {
        sigs.push(FunctionSignature::new(
            "in_collection",
            vec![DataTypeId::Any, t],
            DataTypeId::Bool,
        ));
    }

    // Type checks see NULL and MISSING as regular values.
    for t in DataTypeId::ALL {
        if t == DataTypeId::Any {
            continue;
        }
        sigs.push(
            FunctionSignature::new(format!("is_{}", t.name()), vec![DataTypeId::Any], DataTypeId::Bool)
                .with_absent_handling(),
        );
    }

    sigs
}

/// Functions called by name.
pub fn builtin_functions() -> Vec<FunctionSignature> {
    let mut sigs = Vec::new();

    for name in ["upper", "lower"] {
        sigs.push(FunctionSignature::new(
            name,
            vec![DataTypeId::String],
            DataTypeId::String,
        ));
    }
    sigs.push(FunctionSignature::new(
        "char_length",
        vec![DataTypeId::String],
        DataTypeId::Int64,
    ));
    sigs.push(FunctionSignature::new(
        "substring",
        vec![DataTypeId::String, DataTypeId::Int64],
        DataTypeId::String,
    ));
    sigs.push(FunctionSignature::new(
        "substring",
        vec![DataTypeId::String, DataTypeId::Int64, DataTypeId::Int64],
        DataTypeId::String,
    ));

    for t in NUMERICS {
        sigs.push(FunctionSignature::new("abs", vec![t], t));
    }

    for t in COLLECTIONS {
        sigs.push(FunctionSignature::new("size", vec![t], DataTypeId::Int64));
        sigs.push(FunctionSignature::new("exists", vec![t], DataTypeId::Bool));
    }
    sigs.push(FunctionSignature::new(
        "size",
        vec![DataTypeId::Struct],
        DataTypeId::Int64,
    ));

    sigs.push(FunctionSignature::new("utcnow", Vec::new(), DataTypeId::Timestamp));

    sigs
}

pub fn builtin_aggregates() -> Vec<AggSignature> {
    let mut sigs = Vec::new();

    sigs.push(AggSignature::new("count", vec![DataTypeId::Any], DataTypeId::Int64).with_nullable(false));
    sigs.push(AggSignature::new("count_star", Vec::new(), DataTypeId::Int64).with_nullable(false));

    for t in NUMERICS {
        sigs.push(AggSignature::new("sum", vec![t], t));
        let avg_returns = match t {
            DataTypeId::Float32 | DataTypeId::Float64 => DataTypeId::Float64,
            _ => DataTypeId::Decimal,
        };
        sigs.push(AggSignature::new("avg", vec![t], avg_returns).with_decomposable(false));
    }

    for t in COMPARABLE {
        sigs.push(AggSignature::new("min", vec![t], t));
        sigs.push(AggSignature::new("max", vec![t], t));
    }

    for name in ["every", "any", "some"] {
        sigs.push(AggSignature::new(name, vec![DataTypeId::Bool], DataTypeId::Bool));
    }

    sigs
}
