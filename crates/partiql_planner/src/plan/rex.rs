use std::fmt;

use partiql_ast::{CollectionKind, Identifier, SourceLocation, Symbol, VarScope};
use partiql_error::Result;

use super::rel::Rel;
use crate::functions::{FnMatchCandidate, FunctionSignature};
use crate::types::StaticType;
use crate::value::ScalarValue;

/// A scalar expression in the plan along with its static type.
///
/// The type is `Any` until the typer runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Rex {
    pub op: RexOp,
    pub ty: StaticType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarRef {
    /// Positionally resolved binding. Depth zero is the innermost scope.
    Local { depth: usize, index: usize },
    Global { id: String },
    /// Not yet resolved.
    Unresolved {
        identifier: Identifier,
        scope: VarScope,
        location: SourceLocation,
    },
    /// Looked up by name at run time.
    ///
    /// Produced for undefined variables when the planner is permissive. The
    /// name is searched for in the struct bindings at `lookup_order` before
    /// falling back to globals.
    Dynamic {
        name: String,
        case_sensitive: bool,
        lookup_order: Vec<usize>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Unresolved {
        name: String,
        args: Vec<Rex>,
        is_operator: bool,
        location: SourceLocation,
    },
    Static {
        signature: FunctionSignature,
        args: Vec<Rex>,
        is_missable: bool,
    },
    Dynamic {
        candidates: Vec<FnMatchCandidate<FunctionSignature>>,
        args: Vec<Rex>,
        exhaustive: bool,
        is_missable: bool,
    },
}

impl Call {
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

    pub fn args(&self) -> &[Rex] {
        match self {
            Self::Unresolved { args, .. } | Self::Static { args, .. } | Self::Dynamic { args, .. } => {
                args
            }
        }
    }

    pub fn args_mut(&mut self) -> &mut Vec<Rex> {
        match self {
            Self::Unresolved { args, .. } | Self::Static { args, .. } | Self::Dynamic { args, .. } => {
                args
            }
        }
    }
}

/// How a subquery result is turned into a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubqueryCoercion {
    /// Single value, e.g. `x = (SELECT ...)`.
    Scalar,
    /// Single row, e.g. `(a, b) = (SELECT ...)`.
    Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RexCaseBranch {
    pub condition: Rex,
    pub result: Rex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RexStructField {
    pub key: Rex,
    pub value: Rex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RexOp {
    Lit(ScalarValue),
    Var(VarRef),
    /// `root[key]` where key is an arbitrary expression.
    PathKey { root: Box<Rex>, key: Box<Rex> },
    /// `root.symbol`
    PathSymbol { root: Box<Rex>, symbol: Symbol },
    /// `root[index]` with an integer index.
    PathIndex { root: Box<Rex>, index: Box<Rex> },
    /// `root[*]`
    PathWildcard { root: Box<Rex> },
    /// `root.*`
    PathUnpivot { root: Box<Rex> },
    Call(Call),
    /// Searched CASE. Simple CASE is rewritten during normalization.
    Case {
        branches: Vec<RexCaseBranch>,
        default: Box<Rex>,
    },
    Collection { kind: CollectionKind, values: Vec<Rex> },
    Struct { fields: Vec<RexStructField> },
    /// Merge the fields of several structs.
    TupleUnion { args: Vec<Rex> },
    /// Evaluate `constructor` for every row produced by `rel`.
    Select {
        constructor: Box<Rex>,
        rel: Box<Rel>,
    },
    Pivot {
        key: Box<Rex>,
        value: Box<Rex>,
        rel: Box<Rel>,
    },
    /// `select` is always a `Select`.
    Subquery {
        select: Box<Rex>,
        coercion: SubqueryCoercion,
    },
    Err { message: String },
}

impl Rex {
    pub fn new(op: RexOp) -> Self {
        Rex {
            op,
            ty: StaticType::Any,
        }
    }

    pub fn with_type(op: RexOp, ty: StaticType) -> Self {
        Rex { op, ty }
    }

    pub fn lit(value: impl Into<ScalarValue>) -> Self {
        let value = value.into();
        let ty = value.static_type();
        Rex::with_type(RexOp::Lit(value), ty)
    }

    pub fn local(depth: usize, index: usize) -> Self {
        Rex::new(RexOp::Var(VarRef::Local { depth, index }))
    }

    pub fn err(message: impl Into<String>) -> Self {
        Rex::with_type(
            RexOp::Err {
                message: message.into(),
            },
            StaticType::Missing,
        )
    }

    pub fn unresolved_call(name: impl Into<String>, args: Vec<Rex>, is_operator: bool) -> Self {
        Rex::new(RexOp::Call(Call::Unresolved {
            name: name.into(),
            args,
            is_operator,
            location: SourceLocation::UNKNOWN,
        }))
    }

    pub fn try_as_lit(&self) -> Option<&ScalarValue> {
        match &self.op {
            RexOp::Lit(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.op {
            RexOp::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Mutable access to a relation embedded in this node.
    pub fn rel_mut(&mut self) -> Option<&mut Rel> {
        match &mut self.op {
            RexOp::Select { rel, .. } | RexOp::Pivot { rel, .. } => Some(rel),
            _ => None,
        }
    }

    /// Visit every direct child expression. Relations are not entered.
    pub fn for_each_child_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Rex) -> Result<()>,
    {
        match &mut self.op {
            RexOp::Lit(_) | RexOp::Var(_) | RexOp::Err { .. } => (),
            RexOp::PathKey { root, key } => {
                func(root)?;
                func(key)?;
            }
            RexOp::PathIndex { root, index } => {
                func(root)?;
                func(index)?;
            }
            RexOp::PathSymbol { root, .. }
            | RexOp::PathWildcard { root }
            | RexOp::PathUnpivot { root } => func(root)?,
            RexOp::Call(call) => {
                for arg in call.args_mut() {
                    func(arg)?;
                }
            }
            RexOp::Case { branches, default } => {
                for branch in branches {
                    func(&mut branch.condition)?;
                    func(&mut branch.result)?;
                }
                func(default)?;
            }
            RexOp::Collection { values, .. } => {
                for value in values {
                    func(value)?;
                }
            }
            RexOp::Struct { fields } => {
                for field in fields {
                    func(&mut field.key)?;
                    func(&mut field.value)?;
                }
            }
            RexOp::TupleUnion { args } => {
                for arg in args {
                    func(arg)?;
                }
            }
            RexOp::Select { constructor, .. } => func(constructor)?,
            RexOp::Pivot { key, value, .. } => {
                func(key)?;
                func(value)?;
            }
            RexOp::Subquery { select, .. } => func(select)?,
        }
        Ok(())
    }

    /// Rewrite this expression bottom up.
    pub fn transform_up<F>(mut self, func: &mut F) -> Result<Rex>
    where
        F: FnMut(Rex) -> Result<Rex>,
    {
        self.for_each_child_mut(&mut |child| {
            let orig = std::mem::replace(child, Rex::lit(ScalarValue::Missing));
            *child = orig.transform_up(func)?;
            Ok(())
        })?;
        func(self)
    }

    /// Direct children of this expression. Relations are not entered.
    pub fn children(&self) -> Vec<&Rex> {
        let mut out = Vec::new();
        match &self.op {
            RexOp::Lit(_) | RexOp::Var(_) | RexOp::Err { .. } => (),
            RexOp::PathKey { root, key } => {
                out.push(root.as_ref());
                out.push(key.as_ref());
            }
            RexOp::PathIndex { root, index } => {
                out.push(root.as_ref());
                out.push(index.as_ref());
            }
            RexOp::PathSymbol { root, .. }
            | RexOp::PathWildcard { root }
            | RexOp::PathUnpivot { root } => out.push(root.as_ref()),
            RexOp::Call(call) => out.extend(call.args()),
            RexOp::Case { branches, default } => {
                for branch in branches {
                    out.push(&branch.condition);
                    out.push(&branch.result);
                }
                out.push(default.as_ref());
            }
            RexOp::Collection { values, .. } => out.extend(values.iter()),
            RexOp::Struct { fields } => {
                for field in fields {
                    out.push(&field.key);
                    out.push(&field.value);
                }
            }
            RexOp::TupleUnion { args } => out.extend(args.iter()),
            RexOp::Select { constructor, .. } => out.push(constructor.as_ref()),
            RexOp::Pivot { key, value, .. } => {
                out.push(key.as_ref());
                out.push(value.as_ref());
            }
            RexOp::Subquery { select, .. } => out.push(select.as_ref()),
        }
        out
    }

    /// Check if any expression in this tree satisfies `pred`.
    pub fn any<F>(&self, pred: &mut F) -> bool
    where
        F: FnMut(&Rex) -> bool,
    {
        if pred(self) {
            return true;
        }
        self.children().into_iter().any(|child| child.any(pred))
    }

    /// If this tree contains an error node, meaning a problem has already
    /// been reported for it.
    pub fn contains_err(&self) -> bool {
        self.any(&mut |rex| matches!(rex.op, RexOp::Err { .. }))
    }
}

impl fmt::Display for Rex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            RexOp::Lit(v) => write!(f, "{v}"),
            RexOp::Var(var) => match var {
                VarRef::Local { depth, index } => write!(f, "${depth}.{index}"),
                VarRef::Global { id } => write!(f, "global({id})"),
                VarRef::Unresolved { identifier, .. } => write!(f, "{identifier}"),
                VarRef::Dynamic { name, .. } => write!(f, "dynamic({name})"),
            },
            RexOp::PathKey { root, key } => write!(f, "{root}[{key}]"),
            RexOp::PathSymbol { root, symbol } => write!(f, "{root}.{symbol}"),
            RexOp::PathIndex { root, index } => write!(f, "{root}[{index}]"),
            RexOp::PathWildcard { root } => write!(f, "{root}[*]"),
            RexOp::PathUnpivot { root } => write!(f, "{root}.*"),
            RexOp::Call(call) => {
                write!(f, "{}(", call.name())?;
                write_list(f, call.args())?;
                write!(f, ")")
            }
            RexOp::Case { branches, default } => {
                write!(f, "CASE")?;
                for branch in branches {
                    write!(f, " WHEN {} THEN {}", branch.condition, branch.result)?;
                }
                write!(f, " ELSE {default} END")
            }
            RexOp::Collection { kind, values } => {
                let (open, close) = match kind {
                    CollectionKind::Bag => ("<<", ">>"),
                    CollectionKind::List => ("[", "]"),
                    CollectionKind::Sexp => ("(", ")"),
                };
                write!(f, "{open}")?;
                write_list(f, values)?;
                write!(f, "{close}")
            }
            RexOp::Struct { fields } => {
                write!(f, "{{")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.key, field.value)?;
                }
                write!(f, "}}")
            }
            RexOp::TupleUnion { args } => {
                write!(f, "TUPLEUNION(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            RexOp::Select { constructor, .. } => write!(f, "SELECT({constructor})"),
            RexOp::Pivot { key, value, .. } => write!(f, "PIVOT({value} AT {key})"),
            RexOp::Subquery { select, coercion } => match coercion {
                SubqueryCoercion::Scalar => write!(f, "SCALAR({select})"),
                SubqueryCoercion::Row => write!(f, "ROW({select})"),
            },
            RexOp::Err { message } => write!(f, "ERR({message})"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, rexes: &[Rex]) -> fmt::Result {
    for (idx, rex) in rexes.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{rex}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_up_visits_children_first() {
        let rex = Rex::unresolved_call("not", vec![Rex::lit(true)], true);

        let mut order = Vec::new();
        rex.transform_up(&mut |r| {
            order.push(r.to_string());
            Ok(r)
        })
        .unwrap();

        assert_eq!(vec!["true".to_string(), "not(true)".to_string()], order);
    }

    #[test]
    fn transform_up_stops_at_first_error() {
        let rex = Rex::unresolved_call(
            "eq",
            vec![Rex::lit(1_i64), Rex::unresolved_call("not", vec![Rex::lit(true)], true)],
            true,
        );

        let mut visited = 0;
        let err = rex
            .transform_up(&mut |r| {
                visited += 1;
                if r.try_as_lit().is_some() {
                    return Err(partiql_error::PartiqlError::new("literal"));
                }
                Ok(r)
            })
            .unwrap_err();

        assert_eq!("literal", err.get_msg());
        assert_eq!(1, visited);
    }

    #[test]
    fn display_path() {
        let rex = Rex::new(RexOp::PathSymbol {
            root: Box::new(Rex::local(0, 1)),
            symbol: Symbol::regular("a"),
        });
        assert_eq!("$0.1.a", rex.to_string());
    }
}
