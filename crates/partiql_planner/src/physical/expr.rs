use std::fmt;

use partiql_ast::CollectionKind;
use partiql_error::{PartiqlError, Result};

use super::{OperatorPlanState, PlannedOperator};
use crate::functions::{FnMatchCandidate, FunctionSignature};
use crate::plan::{Call, Rex, RexOp, SubqueryCoercion, VarRef};
use crate::types::StaticType;
use crate::value::ScalarValue;

/// Slot in the environment of a running operator.
///
/// Depth zero is the row produced by the operator's input, higher depths are
/// rows of enclosing operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub depth: usize,
    pub slot: usize,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.depth, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalExpr {
    pub kind: PhysicalExprKind,
    pub ty: StaticType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalExprKind {
    Literal(ScalarValue),
    Register(Register),
    Global {
        id: String,
    },
    /// Search struct registers in order, then globals.
    DynamicLookup {
        name: String,
        case_sensitive: bool,
        lookup_order: Vec<usize>,
    },
    PathKey {
        root: Box<PhysicalExpr>,
        key: Box<PhysicalExpr>,
    },
    PathSymbol {
        root: Box<PhysicalExpr>,
        symbol: String,
        case_sensitive: bool,
    },
    PathIndex {
        root: Box<PhysicalExpr>,
        index: Box<PhysicalExpr>,
    },
    ScalarFunction {
        signature: FunctionSignature,
        args: Vec<PhysicalExpr>,
        is_missable: bool,
    },
    /// Overload picked from the runtime types of the arguments.
    DynamicFunction {
        candidates: Vec<FnMatchCandidate<FunctionSignature>>,
        args: Vec<PhysicalExpr>,
        exhaustive: bool,
    },
    Case {
        branches: Vec<(PhysicalExpr, PhysicalExpr)>,
        default: Box<PhysicalExpr>,
    },
    Collection {
        kind: CollectionKind,
        values: Vec<PhysicalExpr>,
    },
    Struct {
        fields: Vec<(PhysicalExpr, PhysicalExpr)>,
    },
    TupleUnion {
        args: Vec<PhysicalExpr>,
    },
    Select {
        constructor: Box<PhysicalExpr>,
        input: Box<PlannedOperator>,
    },
    Pivot {
        key: Box<PhysicalExpr>,
        value: Box<PhysicalExpr>,
        input: Box<PlannedOperator>,
    },
    Subquery {
        select: Box<PhysicalExpr>,
        coercion: SubqueryCoercion,
    },
}

impl fmt::Display for PhysicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PhysicalExprKind::Literal(v) => write!(f, "{v}"),
            PhysicalExprKind::Register(reg) => write!(f, "{reg}"),
            PhysicalExprKind::Global { id } => write!(f, "global({id})"),
            PhysicalExprKind::DynamicLookup { name, .. } => write!(f, "dynamic({name})"),
            PhysicalExprKind::PathKey { root, key } => write!(f, "{root}[{key}]"),
            PhysicalExprKind::PathSymbol { root, symbol, .. } => write!(f, "{root}.{symbol}"),
            PhysicalExprKind::PathIndex { root, index } => write!(f, "{root}[{index}]"),
            PhysicalExprKind::ScalarFunction { signature, args, .. } => {
                write!(f, "{}(", signature.specific)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            PhysicalExprKind::DynamicFunction {
                candidates, args, ..
            } => {
                let name = candidates
                    .first()
                    .map(|c| c.signature.name.as_str())
                    .unwrap_or("");
                write!(f, "dynamic {name}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            PhysicalExprKind::Case { branches, default } => {
                write!(f, "CASE")?;
                for (condition, result) in branches {
                    write!(f, " WHEN {condition} THEN {result}")?;
                }
                write!(f, " ELSE {default} END")
            }
            PhysicalExprKind::Collection { kind, values } => {
                let (open, close) = match kind {
                    CollectionKind::Bag => ("<<", ">>"),
                    CollectionKind::List => ("[", "]"),
                    CollectionKind::Sexp => ("(", ")"),
                };
                write!(f, "{open}")?;
                write_list(f, values)?;
                write!(f, "{close}")
            }
            PhysicalExprKind::Struct { fields } => {
                write!(f, "{{")?;
                for (idx, (key, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            PhysicalExprKind::TupleUnion { args } => {
                write!(f, "TUPLEUNION(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            PhysicalExprKind::Select { constructor, .. } => write!(f, "SELECT({constructor})"),
            PhysicalExprKind::Pivot { key, value, .. } => write!(f, "PIVOT({value} AT {key})"),
            PhysicalExprKind::Subquery { select, coercion } => match coercion {
                SubqueryCoercion::Scalar => write!(f, "SCALAR({select})"),
                SubqueryCoercion::Row => write!(f, "ROW({select})"),
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[PhysicalExpr]) -> fmt::Result {
    for (idx, expr) in exprs.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

impl OperatorPlanState {
    pub(super) fn plan_exprs(&mut self, rexes: Vec<Rex>) -> Result<Vec<PhysicalExpr>> {
        rexes.into_iter().map(|rex| self.plan_expr(rex)).collect()
    }

    pub(super) fn plan_expr(&mut self, rex: Rex) -> Result<PhysicalExpr> {
        let Rex { op, ty } = rex;

        let kind = match op {
            RexOp::Lit(v) => PhysicalExprKind::Literal(v),
            RexOp::Var(VarRef::Local { depth, index }) => PhysicalExprKind::Register(Register {
                depth,
                slot: index,
            }),
            RexOp::Var(VarRef::Global { id }) => PhysicalExprKind::Global { id },
            RexOp::Var(VarRef::Dynamic {
                name,
                case_sensitive,
                lookup_order,
            }) => PhysicalExprKind::DynamicLookup {
                name,
                case_sensitive,
                lookup_order,
            },
            RexOp::Var(VarRef::Unresolved { identifier, .. }) => {
                return Err(PartiqlError::new("Unresolved variable reached physical planning")
                    .with_field("variable", identifier.to_string()));
            }
            RexOp::PathKey { root, key } => PhysicalExprKind::PathKey {
                root: Box::new(self.plan_expr(*root)?),
                key: Box::new(self.plan_expr(*key)?),
            },
            RexOp::PathSymbol { root, symbol } => PhysicalExprKind::PathSymbol {
                root: Box::new(self.plan_expr(*root)?),
                case_sensitive: symbol.is_case_sensitive(),
                symbol: symbol.text,
            },
            RexOp::PathIndex { root, index } => PhysicalExprKind::PathIndex {
                root: Box::new(self.plan_expr(*root)?),
                index: Box::new(self.plan_expr(*index)?),
            },
            RexOp::PathWildcard { .. } | RexOp::PathUnpivot { .. } => {
                return Err(PartiqlError::new(
                    "Wildcard path steps reached physical planning",
                ));
            }
            RexOp::Call(Call::Static {
                signature,
                args,
                is_missable,
            }) => PhysicalExprKind::ScalarFunction {
                signature,
                args: self.plan_exprs(args)?,
                is_missable,
            },
            RexOp::Call(Call::Dynamic {
                candidates,
                args,
                exhaustive,
                ..
            }) => PhysicalExprKind::DynamicFunction {
                candidates,
                args: self.plan_exprs(args)?,
                exhaustive,
            },
            RexOp::Call(Call::Unresolved { name, .. }) => {
                return Err(PartiqlError::new("Unresolved call reached physical planning")
                    .with_field("function", name));
            }
            RexOp::Case { branches, default } => {
                let mut planned = Vec::with_capacity(branches.len());
                for branch in branches {
                    planned.push((
                        self.plan_expr(branch.condition)?,
                        self.plan_expr(branch.result)?,
                    ));
                }
                PhysicalExprKind::Case {
                    branches: planned,
                    default: Box::new(self.plan_expr(*default)?),
                }
            }
            RexOp::Collection { kind, values } => PhysicalExprKind::Collection {
                kind,
                values: self.plan_exprs(values)?,
            },
            RexOp::Struct { fields } => {
                let mut planned = Vec::with_capacity(fields.len());
                for field in fields {
                    planned.push((self.plan_expr(field.key)?, self.plan_expr(field.value)?));
                }
                PhysicalExprKind::Struct { fields: planned }
            }
            RexOp::TupleUnion { args } => PhysicalExprKind::TupleUnion {
                args: self.plan_exprs(args)?,
            },
            RexOp::Select { constructor, rel } => {
                let input = self.plan(*rel)?;
                PhysicalExprKind::Select {
                    constructor: Box::new(self.plan_expr(*constructor)?),
                    input: Box::new(input),
                }
            }
            RexOp::Pivot { key, value, rel } => {
                let input = self.plan(*rel)?;
                PhysicalExprKind::Pivot {
                    key: Box::new(self.plan_expr(*key)?),
                    value: Box::new(self.plan_expr(*value)?),
                    input: Box::new(input),
                }
            }
            RexOp::Subquery { select, coercion } => PhysicalExprKind::Subquery {
                select: Box::new(self.plan_expr(*select)?),
                coercion,
            },
            RexOp::Err { message } => {
                return Err(PartiqlError::new("Error node reached physical planning")
                    .with_field("message", message));
            }
        };

        Ok(PhysicalExpr { kind, ty })
    }
}
