//! AST to AST rewrites run before lowering.
//!
//! After normalization every FROM source has an AS alias (and an AT alias
//! for UNPIVOT), every select item and group key has an alias, select lists
//! are turned into `SELECT VALUE` of a struct or tuple union, and simple CASE
//! expressions are turned into searched CASE expressions.

use partiql_ast::{
    BinaryOperator, CaseBranch, Dml, DmlOperation, Expr, ExprKind, FromClause, FromSource,
    FromSourceKind, Identifier, Literal, OnConflict, PathStep, ProjectItem, Projection, Query,
    QueryBody, Select, Statement, StructField, VarScope,
};
use tracing::trace;

use crate::diagnostics::{ProblemCollector, ProblemDetails};

/// Reserved call name used to represent the merge of several structs.
///
/// Users can't write names starting with `$` so this can't clash with a
/// real function.
pub const TUPLE_UNION: &str = "$tupleunion";

/// Name used when no alias can be derived from an expression, `_1`, `_2`,
/// etc.
fn positional_alias(pos: usize) -> String {
    format!("_{pos}")
}

/// Derive an alias from the shape of an expression.
///
/// Variables use their last name part, paths use their last symbol or
/// string key.
pub fn derive_alias(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Var { identifier, .. } => Some(identifier.last().text.clone()),
        ExprKind::Path { steps, .. } => match steps.last()? {
            PathStep::Symbol(sym) => Some(sym.text.clone()),
            PathStep::Key(key) => match &key.kind {
                ExprKind::Literal(Literal::String(s)) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug)]
pub struct Normalizer<'a> {
    problems: &'a mut ProblemCollector,
}

impl<'a> Normalizer<'a> {
    pub fn new(problems: &'a mut ProblemCollector) -> Self {
        Normalizer { problems }
    }

    pub fn normalize_statement(&mut self, statement: Statement) -> Statement {
        match statement {
            Statement::Query(query) => Statement::Query(self.normalize_query(query)),
            Statement::Dml(dml) => Statement::Dml(self.normalize_dml(dml)),
            Statement::Ddl(ddl) => Statement::Ddl(ddl),
        }
    }

    pub fn normalize_query(&mut self, query: Query) -> Query {
        let body = match query.body {
            QueryBody::Select(select) => QueryBody::Select(Box::new(self.normalize_select(*select))),
            QueryBody::SetOp {
                op,
                quantifier,
                lhs,
                rhs,
            } => QueryBody::SetOp {
                op,
                quantifier,
                lhs: Box::new(self.normalize_query(*lhs)),
                rhs: Box::new(self.normalize_query(*rhs)),
            },
        };

        Query {
            body,
            location: query.location,
        }
    }

    fn normalize_dml(&mut self, dml: Dml) -> Dml {
        let operation = match dml.operation {
            DmlOperation::Insert { value } => DmlOperation::Insert {
                value: self.normalize_expr(value),
            },
            DmlOperation::Set { assignments } => DmlOperation::Set {
                assignments: assignments
                    .into_iter()
                    .map(|(target, value)| (target, self.normalize_expr(value)))
                    .collect(),
            },
            other => other,
        };

        Dml {
            operation,
            target: dml.target,
            where_clause: dml.where_clause.map(|e| self.normalize_expr(e)),
            on_conflict: dml.on_conflict.map(|c| OnConflict {
                condition: c.condition.map(|e| self.normalize_expr(e)),
                action: c.action,
            }),
            location: dml.location,
        }
    }

    pub fn normalize_select(&mut self, mut select: Select) -> Select {
        // FROM aliases first, SELECT * expands to the bound names.
        let mut from_aliases = Vec::new();
        if let Some(from) = select.from.take() {
            let mut counter = 0;
            let from = self.normalize_from(from, &mut counter);
            self.check_duplicate_aliases(&from, &mut from_aliases);
            select.from = Some(from);
        }

        select.projection = match select.projection {
            Projection::Star if select.group_by.is_some() => {
                // Rejected during lowering.
                Projection::Star
            }
            Projection::Star => {
                let args = from_aliases
                    .iter()
                    .map(|alias| {
                        Expr::new(ExprKind::Var {
                            identifier: Identifier::regular(alias.as_str()),
                            scope: VarScope::Local,
                        })
                    })
                    .collect();
                Projection::Value(tuple_union(args))
            }
            Projection::List(items) => Projection::Value(self.normalize_select_list(items)),
            Projection::Value(expr) => Projection::Value(self.normalize_expr(expr)),
            Projection::Pivot { key, value } => Projection::Pivot {
                key: self.normalize_expr(key),
                value: self.normalize_expr(value),
            },
        };

        if let Some(group_by) = select.group_by.as_mut() {
            for (idx, key) in group_by.keys.iter_mut().enumerate() {
                let expr = std::mem::replace(&mut key.expr, Expr::new(ExprKind::Literal(Literal::Missing)));
                key.expr = self.normalize_expr(expr);
                if key.alias.is_none() {
                    key.alias = Some(derive_alias(&key.expr).unwrap_or_else(|| positional_alias(idx + 1)));
                }
            }
        }

        select.where_clause = select.where_clause.map(|e| self.normalize_expr(e));
        select.having = select.having.map(|e| self.normalize_expr(e));
        select.limit = select.limit.map(|e| self.normalize_expr(e));
        select.offset = select.offset.map(|e| self.normalize_expr(e));
        for spec in &mut select.order_by {
            let expr = std::mem::replace(&mut spec.expr, Expr::new(ExprKind::Literal(Literal::Missing)));
            spec.expr = self.normalize_expr(expr);
        }
        for binding in &mut select.let_bindings {
            let expr = std::mem::replace(&mut binding.expr, Expr::new(ExprKind::Literal(Literal::Missing)));
            binding.expr = self.normalize_expr(expr);
        }

        select
    }

    fn normalize_from(&mut self, from: FromClause, counter: &mut usize) -> FromClause {
        match from {
            FromClause::Source(source) => {
                *counter += 1;
                let expr = self.normalize_expr(source.expr);
                let as_alias = source
                    .as_alias
                    .or_else(|| derive_alias(&expr))
                    .unwrap_or_else(|| positional_alias(*counter));

                // UNPIVOT always binds the attribute name.
                let at_alias = match (source.kind, source.at_alias) {
                    (_, Some(alias)) => Some(alias),
                    (FromSourceKind::Unpivot, None) => {
                        *counter += 1;
                        Some(positional_alias(*counter))
                    }
                    (FromSourceKind::Scan, None) => None,
                };

                FromClause::Source(FromSource {
                    kind: source.kind,
                    expr,
                    as_alias: Some(as_alias),
                    at_alias,
                })
            }
            FromClause::Join {
                kind,
                lhs,
                rhs,
                condition,
            } => {
                let lhs = self.normalize_from(*lhs, counter);
                let rhs = self.normalize_from(*rhs, counter);
                FromClause::Join {
                    kind,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    condition: condition.map(|e| self.normalize_expr(e)),
                }
            }
        }
    }

    /// Collect the aliases bound by a FROM clause in order, reporting any
    /// alias bound twice.
    fn check_duplicate_aliases(&mut self, from: &FromClause, seen: &mut Vec<String>) {
        match from {
            FromClause::Source(source) => {
                let aliases = source.as_alias.iter().chain(source.at_alias.iter());
                for alias in aliases {
                    if seen.iter().any(|s| s.eq_ignore_ascii_case(alias)) {
                        self.problems.error(
                            source.expr.location,
                            ProblemDetails::VariablePreviouslyDefined {
                                name: alias.clone(),
                            },
                        );
                        continue;
                    }
                    seen.push(alias.clone());
                }
            }
            FromClause::Join { lhs, rhs, .. } => {
                self.check_duplicate_aliases(lhs, seen);
                self.check_duplicate_aliases(rhs, seen);
            }
        }
    }

    /// Turn a select list into a single value expression.
    ///
    /// A list with only named items becomes a struct. Any `x.*` item turns
    /// the whole list into a tuple union, with consecutive named items
    /// grouped into one struct.
    fn normalize_select_list(&mut self, items: Vec<ProjectItem>) -> Expr {
        let has_star = items.iter().any(|item| matches!(item, ProjectItem::All(_)));

        let mut args = Vec::new();
        let mut fields = Vec::new();
        for (idx, item) in items.into_iter().enumerate() {
            match item {
                ProjectItem::Expr { expr, alias } => {
                    let expr = self.normalize_expr(expr);
                    let alias = alias
                        .or_else(|| derive_alias(&expr))
                        .unwrap_or_else(|| positional_alias(idx + 1));
                    fields.push(StructField {
                        key: Expr::new(ExprKind::Literal(Literal::String(alias))),
                        value: expr,
                    });
                }
                ProjectItem::All(expr) => {
                    if !fields.is_empty() {
                        args.push(Expr::new(ExprKind::Struct(std::mem::take(&mut fields))));
                    }
                    args.push(self.normalize_expr(expr));
                }
            }
        }

        if !has_star {
            return Expr::new(ExprKind::Struct(fields));
        }
        if !fields.is_empty() {
            args.push(Expr::new(ExprKind::Struct(fields)));
        }
        tuple_union(args)
    }

    /// Normalize an expression, including any subqueries it contains.
    pub fn normalize_expr(&mut self, expr: Expr) -> Expr {
        expr.transform_up(&mut |expr| {
            let location = expr.location;
            match expr.kind {
                ExprKind::Case {
                    operand: Some(operand),
                    branches,
                    default,
                } => {
                    trace!("rewriting simple CASE");
                    let branches = branches
                        .into_iter()
                        .map(|branch| CaseBranch {
                            condition: Expr::new(ExprKind::Binary {
                                op: BinaryOperator::Eq,
                                left: operand.clone(),
                                right: Box::new(branch.condition),
                            })
                            .at(branch.result.location),
                            result: branch.result,
                        })
                        .collect();
                    Expr::new(ExprKind::Case {
                        operand: None,
                        branches,
                        default,
                    })
                    .at(location)
                }
                ExprKind::Subquery(query) => {
                    Expr::new(ExprKind::Subquery(Box::new(self.normalize_query(*query)))).at(location)
                }
                kind => Expr { kind, location },
            }
        })
    }
}

fn tuple_union(args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call {
        name: TUPLE_UNION.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use partiql_ast::builder::*;
    use partiql_ast::{GroupBy, GroupKey, GroupingStrategy, JoinKind, SourceLocation};

    use super::*;

    fn normalize(select: Select) -> (Select, ProblemCollector) {
        let mut problems = ProblemCollector::new();
        let select = Normalizer::new(&mut problems).normalize_select(select);
        (select, problems)
    }

    fn from_aliases(from: &FromClause) -> Vec<(Option<String>, Option<String>)> {
        match from {
            FromClause::Source(s) => vec![(s.as_alias.clone(), s.at_alias.clone())],
            FromClause::Join { lhs, rhs, .. } => {
                let mut out = from_aliases(lhs);
                out.extend(from_aliases(rhs));
                out
            }
        }
    }

    #[test]
    fn default_from_aliases() {
        let from = join(
            JoinKind::Inner,
            join(
                JoinKind::Inner,
                scan(var("tbl"), None),
                scan(dot(var("a"), "items"), None),
                None,
            ),
            scan(bag(vec![lit_int(1)]), None),
            None,
        );
        let (select, problems) = normalize(select_value(var("x"), Some(from)));

        assert!(!problems.has_errors());
        assert_eq!(
            vec![
                (Some("tbl".to_string()), None),
                (Some("items".to_string()), None),
                (Some("_3".to_string()), None),
            ],
            from_aliases(select.from.as_ref().unwrap())
        );
    }

    #[test]
    fn unpivot_gets_at_alias() {
        let from = FromClause::Source(FromSource {
            kind: FromSourceKind::Unpivot,
            expr: var("s"),
            as_alias: Some("v".to_string()),
            at_alias: None,
        });
        let (select, _) = normalize(select_value(var("v"), Some(from)));
        assert_eq!(
            vec![(Some("v".to_string()), Some("_2".to_string()))],
            from_aliases(select.from.as_ref().unwrap())
        );
    }

    #[test]
    fn duplicate_from_alias() {
        let from = join(
            JoinKind::Inner,
            scan(var("a"), Some("t")),
            scan(var("b").at(SourceLocation::new(1, 20, 1)), Some("T")),
            None,
        );
        let (_, mut problems) = normalize(select_value(var("t"), Some(from)));

        let problems = problems.take();
        assert_eq!(1, problems.len());
        assert_eq!(SourceLocation::new(1, 20, 1), problems[0].location);
        assert_eq!(
            ProblemDetails::VariablePreviouslyDefined {
                name: "T".to_string()
            },
            problems[0].details
        );
    }

    #[test]
    fn select_list_to_struct() {
        let select = select_list(
            vec![
                (dot(var("t"), "a"), None),
                (var("b"), Some("renamed")),
                (plus(lit_int(1), lit_int(2)), None),
            ],
            Some(scan(var("t"), None)),
        );
        let (select, _) = normalize(select);

        let expected = struct_lit(vec![
            ("a", dot(var("t"), "a")),
            ("renamed", var("b")),
            ("_3", plus(lit_int(1), lit_int(2))),
        ]);
        assert_eq!(Projection::Value(expected), select.projection);
    }

    #[test]
    fn select_star_to_tuple_union() {
        let from = join(JoinKind::Inner, scan(var("a"), None), scan(var("b"), Some("x")), None);
        let (select, _) = normalize(Select {
            from: Some(from),
            ..Select::new(Projection::Star)
        });

        let local = |name: &str| {
            Expr::new(ExprKind::Var {
                identifier: Identifier::regular(name),
                scope: VarScope::Local,
            })
        };
        assert_eq!(
            Projection::Value(tuple_union(vec![local("a"), local("x")])),
            select.projection
        );
    }

    #[test]
    fn select_star_with_group_by_untouched() {
        let (select, _) = normalize(Select {
            from: Some(scan(var("t"), None)),
            group_by: Some(GroupBy {
                strategy: GroupingStrategy::Full,
                keys: vec![GroupKey {
                    expr: dot(var("t"), "a"),
                    alias: None,
                }],
                group_as: None,
            }),
            ..Select::new(Projection::Star)
        });

        assert_eq!(Projection::Star, select.projection);
        assert_eq!(Some("a".to_string()), select.group_by.unwrap().keys[0].alias);
    }

    #[test]
    fn mixed_star_and_items() {
        let items = vec![
            ProjectItem::Expr {
                expr: var("a"),
                alias: None,
            },
            ProjectItem::All(var("t")),
            ProjectItem::Expr {
                expr: var("b"),
                alias: None,
            },
        ];
        let (select, _) = normalize(Select::new(Projection::List(items)));

        let expected = tuple_union(vec![
            struct_lit(vec![("a", var("a"))]),
            var("t"),
            struct_lit(vec![("b", var("b"))]),
        ]);
        assert_eq!(Projection::Value(expected), select.projection);
    }

    #[test]
    fn simple_case_to_searched() {
        let simple = Expr::new(ExprKind::Case {
            operand: Some(Box::new(var("x"))),
            branches: vec![CaseBranch {
                condition: lit_int(1),
                result: lit_str("one"),
            }],
            default: None,
        });

        let mut problems = ProblemCollector::new();
        let normalized = Normalizer::new(&mut problems).normalize_expr(simple);

        let expected = case_when(vec![(eq(var("x"), lit_int(1)), lit_str("one"))], None);
        assert_eq!(expected, normalized);
    }

    #[test]
    fn subqueries_normalized() {
        let inner = Query::select(select_list(vec![(var("a"), None)], Some(scan(var("t"), None))));
        let mut problems = ProblemCollector::new();
        let normalized = Normalizer::new(&mut problems).normalize_expr(eq(lit_int(1), subquery(inner)));

        let ExprKind::Binary { right, .. } = normalized.kind else {
            panic!("expected binary");
        };
        let ExprKind::Subquery(query) = right.kind else {
            panic!("expected subquery");
        };
        let QueryBody::Select(select) = query.body else {
            panic!("expected select");
        };
        assert_eq!(
            Projection::Value(struct_lit(vec![("a", var("a"))])),
            select.projection
        );
    }
}
