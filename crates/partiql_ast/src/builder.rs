//! Constructors for building AST nodes by hand.

use crate::expr::*;
use crate::identifier::{Identifier, Symbol};
use crate::query::*;

pub fn lit(literal: Literal) -> Expr {
    Expr::new(ExprKind::Literal(literal))
}

pub fn lit_int(v: i64) -> Expr {
    lit(Literal::Integer(v))
}

pub fn lit_bool(v: bool) -> Expr {
    lit(Literal::Boolean(v))
}

pub fn lit_str(v: impl Into<String>) -> Expr {
    lit(Literal::String(v.into()))
}

pub fn lit_float(v: f64) -> Expr {
    lit(Literal::Float(v))
}

pub fn lit_null() -> Expr {
    lit(Literal::Null)
}

pub fn lit_missing() -> Expr {
    lit(Literal::Missing)
}

/// Case-insensitive variable reference.
pub fn var(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Var {
        identifier: Identifier::regular(name),
        scope: VarScope::Default,
    })
}

/// Case-sensitive (double quoted) variable reference.
pub fn var_delimited(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Var {
        identifier: Identifier::delimited(name),
        scope: VarScope::Default,
    })
}

/// Local-first variable reference, `@name`.
pub fn var_local(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Var {
        identifier: Identifier::regular(name),
        scope: VarScope::Local,
    })
}

/// Qualified reference such as `db.orders`.
pub fn var_qualified(first: &str, rest: &[&str]) -> Expr {
    let parts = std::iter::once(first)
        .chain(rest.iter().copied())
        .map(Symbol::regular)
        .collect();
    let identifier = match Identifier::qualified(parts) {
        Some(ident) => ident,
        None => Identifier::regular(first),
    };
    Expr::new(ExprKind::Var {
        identifier,
        scope: VarScope::Default,
    })
}

/// `root.name`
pub fn dot(root: Expr, name: impl Into<String>) -> Expr {
    path(root, vec![PathStep::Symbol(Symbol::regular(name))])
}

/// `root[key]`
pub fn index(root: Expr, key: Expr) -> Expr {
    path(root, vec![PathStep::Key(key)])
}

pub fn path(root: Expr, steps: Vec<PathStep>) -> Expr {
    Expr::new(ExprKind::Path {
        root: Box::new(root),
        steps,
    })
}

pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call {
        name: name.into(),
        args,
    })
}

pub fn agg(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Agg {
        name: name.into(),
        args,
        quantifier: SetQuantifier::All,
    })
}

pub fn unary(op: UnaryOperator, expr: Expr) -> Expr {
    Expr::new(ExprKind::Unary {
        op,
        expr: Box::new(expr),
    })
}

pub fn not(expr: Expr) -> Expr {
    unary(UnaryOperator::Not, expr)
}

pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOperator::Eq, left, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    binary(BinaryOperator::And, left, right)
}

pub fn plus(left: Expr, right: Expr) -> Expr {
    binary(BinaryOperator::Plus, left, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOperator::Gt, left, right)
}

/// Searched CASE.
pub fn case_when(branches: Vec<(Expr, Expr)>, default: Option<Expr>) -> Expr {
    Expr::new(ExprKind::Case {
        operand: None,
        branches: branches
            .into_iter()
            .map(|(condition, result)| CaseBranch { condition, result })
            .collect(),
        default: default.map(Box::new),
    })
}

/// Struct literal with string keys.
pub fn struct_lit(fields: Vec<(&str, Expr)>) -> Expr {
    Expr::new(ExprKind::Struct(
        fields
            .into_iter()
            .map(|(k, value)| StructField {
                key: lit_str(k),
                value,
            })
            .collect(),
    ))
}

pub fn bag(values: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Collection {
        kind: CollectionKind::Bag,
        values,
    })
}

pub fn list(values: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Collection {
        kind: CollectionKind::List,
        values,
    })
}

pub fn is_type(expr: Expr, ty: TypeName) -> Expr {
    Expr::new(ExprKind::IsType {
        expr: Box::new(expr),
        ty,
        not: false,
    })
}

pub fn cast(expr: Expr, ty: TypeName) -> Expr {
    Expr::new(ExprKind::Cast {
        expr: Box::new(expr),
        ty,
    })
}

pub fn subquery(query: Query) -> Expr {
    Expr::new(ExprKind::Subquery(Box::new(query)))
}

pub fn scan(expr: Expr, alias: Option<&str>) -> FromClause {
    FromClause::Source(FromSource {
        kind: FromSourceKind::Scan,
        expr,
        as_alias: alias.map(|s| s.to_string()),
        at_alias: None,
    })
}

pub fn join(kind: JoinKind, lhs: FromClause, rhs: FromClause, condition: Option<Expr>) -> FromClause {
    FromClause::Join {
        kind,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        condition,
    }
}

/// `SELECT VALUE <value> FROM <from>`
pub fn select_value(value: Expr, from: Option<FromClause>) -> Select {
    let mut select = Select::new(Projection::Value(value));
    select.from = from;
    select
}

/// `SELECT <items> FROM <from>`
pub fn select_list(items: Vec<(Expr, Option<&str>)>, from: Option<FromClause>) -> Select {
    let items = items
        .into_iter()
        .map(|(expr, alias)| ProjectItem::Expr {
            expr,
            alias: alias.map(|s| s.to_string()),
        })
        .collect();
    let mut select = Select::new(Projection::List(items));
    select.from = from;
    select
}
