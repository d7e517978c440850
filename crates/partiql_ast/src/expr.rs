use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::identifier::{Identifier, Symbol};
use crate::location::SourceLocation;
use crate::query::{Query, SetQuantifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Plus, e.g. `+9`
    Pos,
    /// Minus, e.g. `-9`
    Neg,
    /// Not, e.g. `NOT true`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// Plus, e.g. `a + b`
    Plus,
    /// Minus, e.g. `a - b`
    Minus,
    /// Multiply, e.g. `a * b`
    Times,
    /// Divide, e.g. `a / b`
    Divide,
    /// Modulo, e.g. `a % b`
    Modulo,
    /// String concat, e.g. `a || b`
    Concat,
    /// Equal, e.g. `a = b`
    Eq,
    /// Not equal, e.g. `a <> b`
    NotEq,
    /// Less than, e.g. `a < b`
    Lt,
    /// Less equal, e.g. `a <= b`
    LtEq,
    /// Greater than, e.g. `a > b`
    Gt,
    /// Greater equal, e.g. `a >= b`
    GtEq,
    /// And, e.g. `a AND b`
    And,
    /// Or, e.g. `a OR b`
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "||",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
        };
        write!(f, "{s}")
    }
}

/// Type names usable in `CAST` and `IS` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Null,
    Missing,
    Any,
    Bool,
    SmallInt,
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
    List,
    Bag,
    Sexp,
    Struct,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Missing,
    Boolean(bool),
    Integer(i64),
    /// Exact numeric, `mantissa * 10^-scale`.
    Decimal { mantissa: i128, scale: u32 },
    Float(f64),
    String(String),
    Date(NaiveDate),
    /// A time, optionally with an explicit offset.
    Time {
        time: NaiveTime,
        offset: Option<FixedOffset>,
    },
    Timestamp {
        timestamp: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
}

/// Lookup preference for a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarScope {
    /// Use the resolution strategy of the enclosing clause.
    Default,
    /// Local bindings first, e.g. `@x`.
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// `a.b`
    Symbol(Symbol),
    /// `a[<expr>]`
    Key(Expr),
    /// `a[*]`
    Wildcard,
    /// `a.*`
    Unpivot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Bag,
    List,
    Sexp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Var {
        identifier: Identifier,
        scope: VarScope,
    },
    Path {
        root: Box<Expr>,
        steps: Vec<PathStep>,
    },
    /// Scalar function call, e.g. `upper(a)`.
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// Aggregate function call, e.g. `sum(DISTINCT a)`.
    ///
    /// `COUNT(*)` is represented with a name of `count` and no arguments.
    Agg {
        name: String,
        args: Vec<Expr>,
        quantifier: SetQuantifier,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Searched (`operand` is None) or simple CASE.
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<CaseBranch>,
        default: Option<Box<Expr>>,
    },
    Struct(Vec<StructField>),
    Collection {
        kind: CollectionKind,
        values: Vec<Expr>,
    },
    Subquery(Box<Query>),
    /// `<expr> IS [NOT] <type>`
    IsType {
        expr: Box<Expr>,
        ty: TypeName,
        not: bool,
    },
    Cast {
        expr: Box<Expr>,
        ty: TypeName,
    },
    Like {
        value: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        not: bool,
    },
    Between {
        value: Box<Expr>,
        lower: Box<Expr>,
        upper: Box<Expr>,
        not: bool,
    },
    InCollection {
        value: Box<Expr>,
        collection: Box<Expr>,
        not: bool,
    },
    NullIf {
        value: Box<Expr>,
        nullifier: Box<Expr>,
    },
    Coalesce(Vec<Expr>),
}

/// An expression along with where it came from.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            location: SourceLocation::UNKNOWN,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    /// Visit every direct child expression. Subqueries are not entered.
    pub fn for_each_child_mut<F>(&mut self, func: &mut F)
    where
        F: FnMut(&mut Expr),
    {
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Var { .. } | ExprKind::Subquery(_) => (),
            ExprKind::Path { root, steps } => {
                func(root);
                for step in steps {
                    if let PathStep::Key(key) = step {
                        func(key);
                    }
                }
            }
            ExprKind::Call { args, .. } | ExprKind::Agg { args, .. } => {
                args.iter_mut().for_each(func);
            }
            ExprKind::Coalesce(args) => args.iter_mut().for_each(func),
            ExprKind::Unary { expr, .. } => func(expr),
            ExprKind::Binary { left, right, .. } => {
                func(left);
                func(right);
            }
            ExprKind::Case {
                operand,
                branches,
                default,
            } => {
                if let Some(operand) = operand {
                    func(operand);
                }
                for branch in branches {
                    func(&mut branch.condition);
                    func(&mut branch.result);
                }
                if let Some(default) = default {
                    func(default);
                }
            }
            ExprKind::Struct(fields) => {
                for field in fields {
                    func(&mut field.key);
                    func(&mut field.value);
                }
            }
            ExprKind::Collection { values, .. } => values.iter_mut().for_each(func),
            ExprKind::IsType { expr, .. } | ExprKind::Cast { expr, .. } => func(expr),
            ExprKind::Like {
                value,
                pattern,
                escape,
                ..
            } => {
                func(value);
                func(pattern);
                if let Some(escape) = escape {
                    func(escape);
                }
            }
            ExprKind::Between {
                value,
                lower,
                upper,
                ..
            } => {
                func(value);
                func(lower);
                func(upper);
            }
            ExprKind::InCollection {
                value, collection, ..
            } => {
                func(value);
                func(collection);
            }
            ExprKind::NullIf { value, nullifier } => {
                func(value);
                func(nullifier);
            }
        }
    }

    /// Rewrite this expression bottom up, stopping at subqueries.
    pub fn transform_up<F>(mut self, func: &mut F) -> Expr
    where
        F: FnMut(Expr) -> Expr,
    {
        self.for_each_child_mut(&mut |child| {
            let orig = std::mem::replace(child, Expr::new(ExprKind::Literal(Literal::Missing)));
            *child = orig.transform_up(func);
        });
        func(self)
    }

    /// Check if any expression in this tree satisfies `pred`. Subqueries are
    /// not searched.
    pub fn any<F>(&self, pred: &mut F) -> bool
    where
        F: FnMut(&Expr) -> bool,
    {
        if pred(self) {
            return true;
        }
        self.children().into_iter().any(|child| child.any(pred))
    }

    /// Direct children of this expression, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Var { .. } | ExprKind::Subquery(_) => (),
            ExprKind::Path { root, steps } => {
                out.push(root.as_ref());
                for step in steps {
                    if let PathStep::Key(key) = step {
                        out.push(key);
                    }
                }
            }
            ExprKind::Call { args, .. } | ExprKind::Agg { args, .. } | ExprKind::Coalesce(args) => {
                out.extend(args.iter())
            }
            ExprKind::Unary { expr, .. }
            | ExprKind::IsType { expr, .. }
            | ExprKind::Cast { expr, .. } => out.push(expr.as_ref()),
            ExprKind::Binary { left, right, .. } => {
                out.push(left.as_ref());
                out.push(right.as_ref());
            }
            ExprKind::Case {
                operand,
                branches,
                default,
            } => {
                out.extend(operand.as_deref());
                for branch in branches {
                    out.push(&branch.condition);
                    out.push(&branch.result);
                }
                out.extend(default.as_deref());
            }
            ExprKind::Struct(fields) => {
                for field in fields {
                    out.push(&field.key);
                    out.push(&field.value);
                }
            }
            ExprKind::Collection { values, .. } => out.extend(values.iter()),
            ExprKind::Like {
                value,
                pattern,
                escape,
                ..
            } => {
                out.push(value.as_ref());
                out.push(pattern.as_ref());
                out.extend(escape.as_deref());
            }
            ExprKind::Between {
                value,
                lower,
                upper,
                ..
            } => {
                out.push(value.as_ref());
                out.push(lower.as_ref());
                out.push(upper.as_ref());
            }
            ExprKind::InCollection {
                value, collection, ..
            } => {
                out.push(value.as_ref());
                out.push(collection.as_ref());
            }
            ExprKind::NullIf { value, nullifier } => {
                out.push(value.as_ref());
                out.push(nullifier.as_ref());
            }
        }
        out
    }
}

/// Source locations are ignored when comparing expressions.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}
