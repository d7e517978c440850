use std::fmt;

use partiql_ast::{GroupingStrategy, JoinKind, SetOperator, SetQuantifier, SourceLocation};
use partiql_error::Result;

use super::rex::Rex;
use crate::functions::{AggSignature, FnMatchCandidate};
use crate::types::StaticType;

/// A named, typed variable produced by a relational operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub ty: StaticType,
}

impl Binding {
    pub fn new(name: impl Into<String>, ty: StaticType) -> Self {
        Binding {
            name: name.into(),
            ty,
        }
    }

    /// Binding whose type hasn't been computed yet.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, StaticType::Any)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AscNullsFirst => write!(f, "ASC NULLS FIRST"),
            Self::AscNullsLast => write!(f, "ASC NULLS LAST"),
            Self::DescNullsFirst => write!(f, "DESC NULLS FIRST"),
            Self::DescNullsLast => write!(f, "DESC NULLS LAST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub rex: Rex,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggCall {
    Unresolved {
        name: String,
        args: Vec<Rex>,
        quantifier: SetQuantifier,
        location: SourceLocation,
    },
    Static {
        signature: AggSignature,
        args: Vec<Rex>,
        quantifier: SetQuantifier,
    },
    Dynamic {
        candidates: Vec<FnMatchCandidate<AggSignature>>,
        args: Vec<Rex>,
        quantifier: SetQuantifier,
    },
}

impl AggCall {
    pub fn name(&self) -> &str {
        match self {
            Self::Unresolved { name, .. } => name,
            Self::Static { signature, .. } => &signature.name,
            Self::Dynamic { candidates, .. } => candidates
                .first()
                .map(|c| c.signature.name.as_str())
                .unwrap_or(""),
        }
    }

    pub fn args_mut(&mut self) -> &mut Vec<Rex> {
        match self {
            Self::Unresolved { args, .. } | Self::Static { args, .. } | Self::Dynamic { args, .. } => {
                args
            }
        }
    }

    pub fn args(&self) -> &[Rex] {
        match self {
            Self::Unresolved { args, .. } | Self::Static { args, .. } | Self::Dynamic { args, .. } => {
                args
            }
        }
    }
}

impl fmt::Display for AggCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (idx, arg) in self.args().iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A relational operator along with the bindings it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Rel {
    pub op: RelOp,
    pub schema: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelOp {
    /// Iterate over the elements of a collection.
    Scan { rex: Rex },
    /// Like scan, additionally binding each element's position.
    ScanIndexed { rex: Rex },
    /// Iterate over the fields of a struct, binding value and name.
    Unpivot { rex: Rex },
    Filter { input: Box<Rel>, predicate: Rex },
    Project { input: Box<Rel>, projections: Vec<Rex> },
    Join {
        lhs: Box<Rel>,
        rhs: Box<Rel>,
        condition: Rex,
        kind: JoinKind,
    },
    /// Output bindings are the aggregate results followed by the group keys.
    Aggregate {
        input: Box<Rel>,
        calls: Vec<AggCall>,
        groups: Vec<Rex>,
        strategy: GroupingStrategy,
    },
    Sort { input: Box<Rel>, specs: Vec<SortSpec> },
    Limit { input: Box<Rel>, limit: Rex },
    Offset { input: Box<Rel>, offset: Rex },
    Distinct { input: Box<Rel> },
    SetOp {
        op: SetOperator,
        quantifier: SetQuantifier,
        lhs: Box<Rel>,
        rhs: Box<Rel>,
    },
    Exclude { input: Box<Rel>, paths: Vec<Rex> },
    Err { message: String },
}

impl Rel {
    pub fn new(op: RelOp, schema: Vec<Binding>) -> Self {
        Rel { op, schema }
    }

    /// Determine if rows produced by this relation have a defined order.
    pub fn is_ordered(&self) -> bool {
        match &self.op {
            RelOp::Sort { .. } => true,
            RelOp::Limit { input, .. }
            | RelOp::Offset { input, .. }
            | RelOp::Project { input, .. }
            | RelOp::Distinct { input }
            | RelOp::Exclude { input, .. } => input.is_ordered(),
            _ => false,
        }
    }

    /// Direct inputs of this operator.
    pub fn children(&self) -> Vec<&Rel> {
        match &self.op {
            RelOp::Scan { .. } | RelOp::ScanIndexed { .. } | RelOp::Unpivot { .. } | RelOp::Err { .. } => {
                Vec::new()
            }
            RelOp::Filter { input, .. }
            | RelOp::Project { input, .. }
            | RelOp::Aggregate { input, .. }
            | RelOp::Sort { input, .. }
            | RelOp::Limit { input, .. }
            | RelOp::Offset { input, .. }
            | RelOp::Distinct { input }
            | RelOp::Exclude { input, .. } => vec![input.as_ref()],
            RelOp::Join { lhs, rhs, .. } | RelOp::SetOp { lhs, rhs, .. } => {
                vec![lhs.as_ref(), rhs.as_ref()]
            }
        }
    }

    pub fn for_each_child_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Rel) -> Result<()>,
    {
        match &mut self.op {
            RelOp::Scan { .. } | RelOp::ScanIndexed { .. } | RelOp::Unpivot { .. } | RelOp::Err { .. } => {
                Ok(())
            }
            RelOp::Filter { input, .. }
            | RelOp::Project { input, .. }
            | RelOp::Aggregate { input, .. }
            | RelOp::Sort { input, .. }
            | RelOp::Limit { input, .. }
            | RelOp::Offset { input, .. }
            | RelOp::Distinct { input }
            | RelOp::Exclude { input, .. } => func(input),
            RelOp::Join { lhs, rhs, .. } | RelOp::SetOp { lhs, rhs, .. } => {
                func(lhs)?;
                func(rhs)
            }
        }
    }

    /// Visit expressions owned directly by this operator.
    pub fn for_each_expr_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Rex) -> Result<()>,
    {
        match &mut self.op {
            RelOp::Scan { rex } | RelOp::ScanIndexed { rex } | RelOp::Unpivot { rex } => func(rex),
            RelOp::Filter { predicate, .. } => func(predicate),
            RelOp::Project { projections, .. } => projections.iter_mut().try_for_each(func),
            RelOp::Join { condition, .. } => func(condition),
            RelOp::Aggregate { calls, groups, .. } => {
                for call in calls {
                    call.args_mut().iter_mut().try_for_each(&mut *func)?;
                }
                groups.iter_mut().try_for_each(func)
            }
            RelOp::Sort { specs, .. } => specs.iter_mut().try_for_each(|s| func(&mut s.rex)),
            RelOp::Limit { limit, .. } => func(limit),
            RelOp::Offset { offset, .. } => func(offset),
            RelOp::Exclude { paths, .. } => paths.iter_mut().try_for_each(func),
            RelOp::Distinct { .. } | RelOp::SetOp { .. } | RelOp::Err { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarValue;

    fn scan() -> Rel {
        Rel::new(
            RelOp::Scan {
                rex: Rex::lit(ScalarValue::Null),
            },
            vec![Binding::untyped("t")],
        )
    }

    #[test]
    fn ordered_through_limit() {
        let sort = Rel::new(
            RelOp::Sort {
                input: Box::new(scan()),
                specs: Vec::new(),
            },
            Vec::new(),
        );
        let limit = Rel::new(
            RelOp::Limit {
                input: Box::new(sort),
                limit: Rex::lit(1_i64),
            },
            Vec::new(),
        );
        assert!(limit.is_ordered());
        assert!(!scan().is_ordered());
    }

    #[test]
    fn visit_filter_exprs() {
        let mut filter = Rel::new(
            RelOp::Filter {
                input: Box::new(scan()),
                predicate: Rex::lit(true),
            },
            Vec::new(),
        );

        let mut count = 0;
        filter
            .for_each_expr_mut(&mut |_| {
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(1, count);
    }
}
