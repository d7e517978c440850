use partiql_error::Result;

use super::ExpressionRewriteRule;
use crate::plan::{Call, Rex, RexCaseBranch, RexOp, RexStructField};
use crate::types::{StaticType, StructField};
use crate::value::ScalarValue;

/// Simplify expressions whose outcome is known statically.
///
/// Rules only look at a node's immediate children, so rewriting bottom up
/// folds whole trees in a single pass and folding a folded tree is a no-op.
#[derive(Debug)]
pub struct ConstFold;

impl ExpressionRewriteRule for ConstFold {
    fn rewrite(expression: Rex) -> Result<Rex> {
        expression.transform_up(&mut |rex| Ok(Self::fold_node(rex)))
    }
}

impl ConstFold {
    /// Fold a single node, assuming its children are already folded.
    pub fn fold_node(rex: Rex) -> Rex {
        let Rex { op, ty } = rex;
        match op {
            RexOp::Case { branches, default } => fold_case(branches, *default, ty),
            RexOp::PathSymbol { root, symbol } => {
                let found = struct_field_value(&root, |key| symbol.matches(key));
                match found {
                    Some(value) => value,
                    None => Rex::with_type(RexOp::PathSymbol { root, symbol }, ty),
                }
            }
            RexOp::PathKey { root, key } => {
                let found = match key.try_as_lit().and_then(|k| k.try_as_str()) {
                    Some(name) => struct_field_value(&root, |k| k == name),
                    None => None,
                };
                match found {
                    Some(value) => value,
                    None => Rex::with_type(RexOp::PathKey { root, key }, ty),
                }
            }
            RexOp::TupleUnion { args } => fold_tuple_union(args, ty),
            RexOp::Call(call) => fold_call(call, ty),
            op => Rex::with_type(op, ty),
        }
    }
}

fn fold_case(branches: Vec<RexCaseBranch>, default: Rex, ty: StaticType) -> Rex {
    let orig_len = branches.len();
    let mut kept = Vec::with_capacity(branches.len());
    let mut default = default;

    for branch in branches {
        match branch.condition.try_as_lit().and_then(|v| v.try_as_bool()) {
            Some(true) => {
                // Remaining branches are unreachable.
                default = branch.result;
                break;
            }
            Some(false) => (),
            None => kept.push(branch),
        }
    }

    if kept.is_empty() {
        return default;
    }

    let ty = if kept.len() == orig_len {
        ty
    } else {
        StaticType::union(
            kept.iter()
                .map(|b| b.result.ty.clone())
                .chain([default.ty.clone()]),
        )
    };

    Rex::with_type(
        RexOp::Case {
            branches: kept,
            default: Box::new(default),
        },
        ty,
    )
}

/// Find the single field of a struct constructor whose key matches.
///
/// Returns None if `root` isn't a struct constructor, if any key isn't a
/// string literal, or if zero or several fields match.
fn struct_field_value(root: &Rex, matches: impl Fn(&str) -> bool) -> Option<Rex> {
    let RexOp::Struct { fields } = &root.op else {
        return None;
    };

    let mut found = None;
    for field in fields {
        let key = field.key.try_as_lit()?.try_as_str()?;
        if matches(key) {
            if found.is_some() {
                return None;
            }
            found = Some(&field.value);
        }
    }

    found.cloned()
}

fn fold_tuple_union(args: Vec<Rex>, ty: StaticType) -> Rex {
    let mut fields = Vec::new();
    for arg in &args {
        match &arg.op {
            RexOp::Struct { fields: arg_fields } => fields.extend(arg_fields.iter().cloned()),
            // Repeating a variable reference per field is cheap, anything else
            // would be evaluated multiple times.
            RexOp::Var(_) => match arg.ty.as_closed_struct() {
                Some(shape) => fields.extend(shape.fields.iter().map(|f| RexStructField {
                    key: Rex::lit(f.name.as_str()),
                    value: Rex::with_type(
                        RexOp::PathKey {
                            root: Box::new(arg.clone()),
                            key: Box::new(Rex::lit(f.name.as_str())),
                        },
                        f.ty.clone(),
                    ),
                })),
                None => return Rex::with_type(RexOp::TupleUnion { args }, ty),
            },
            _ => return Rex::with_type(RexOp::TupleUnion { args }, ty),
        }
    }

    let shape: Option<Vec<StructField>> = fields
        .iter()
        .map(|f| {
            let name = f.key.try_as_lit()?.try_as_str()?;
            Some(StructField::new(name, f.value.ty.clone()))
        })
        .collect();

    let ty = match shape {
        Some(shape) => StaticType::closed_struct(shape),
        None => ty,
    };

    Rex::with_type(RexOp::Struct { fields }, ty)
}

fn fold_call(call: Call, ty: StaticType) -> Rex {
    let args = call.args();

    match (call.name(), args) {
        ("not", [arg]) => match arg.try_as_lit() {
            Some(ScalarValue::Bool(b)) => return Rex::lit(!b),
            Some(v) if v.is_absent() => return Rex::lit(v.clone()),
            _ => (),
        },
        ("eq", [left, right]) => {
            if left == right {
                return Rex::lit(true);
            }
            if let (Some(l), Some(r)) = (left.try_as_lit(), right.try_as_lit()) {
                return Rex::lit(l.equals(r));
            }
        }
        ("is_struct", [arg]) => {
            if matches!(arg.op, RexOp::Struct { .. }) {
                return Rex::lit(true);
            }
            if let Some(is_struct) = arg.ty.is_struct() {
                return Rex::lit(is_struct);
            }
        }
        _ => (),
    }

    Rex::with_type(RexOp::Call(call), ty)
}

#[cfg(test)]
mod tests {
    use partiql_ast::{Identifier, SourceLocation, Symbol, VarScope};

    use super::*;
    use crate::plan::VarRef;

    fn var(name: &str) -> Rex {
        Rex::new(RexOp::Var(VarRef::Unresolved {
            identifier: Identifier::regular(name),
            scope: VarScope::Default,
            location: SourceLocation::UNKNOWN,
        }))
    }

    fn case(branches: Vec<(Rex, Rex)>, default: Rex) -> Rex {
        Rex::new(RexOp::Case {
            branches: branches
                .into_iter()
                .map(|(condition, result)| RexCaseBranch { condition, result })
                .collect(),
            default: Box::new(default),
        })
    }

    fn struct_lit(fields: Vec<(&str, Rex)>) -> Rex {
        Rex::new(RexOp::Struct {
            fields: fields
                .into_iter()
                .map(|(k, value)| RexStructField {
                    key: Rex::lit(k),
                    value,
                })
                .collect(),
        })
    }

    fn dot(root: Rex, name: &str) -> Rex {
        Rex::new(RexOp::PathSymbol {
            root: Box::new(root),
            symbol: Symbol::regular(name),
        })
    }

    fn call(name: &str, args: Vec<Rex>) -> Rex {
        Rex::unresolved_call(name, args, true)
    }

    fn fold(rex: Rex) -> Rex {
        ConstFold::rewrite(rex).unwrap()
    }

    #[test]
    fn no_fold_literal() {
        assert_eq!(Rex::lit(1_i64), fold(Rex::lit(1_i64)));
    }

    #[test]
    fn case_true_short_circuits() {
        // CASE WHEN true THEN 1 WHEN x THEN 2 END
        let rex = case(
            vec![
                (Rex::lit(true), Rex::lit(1_i64)),
                (var("x"), Rex::lit(2_i64)),
            ],
            Rex::lit(ScalarValue::Null),
        );
        assert_eq!(Rex::lit(1_i64), fold(rex));
    }

    #[test]
    fn case_false_dropped() {
        // CASE WHEN false THEN 1 ELSE 2 END
        let rex = case(vec![(Rex::lit(false), Rex::lit(1_i64))], Rex::lit(2_i64));
        assert_eq!(Rex::lit(2_i64), fold(rex));
    }

    #[test]
    fn case_true_after_unknown_becomes_default() {
        // CASE WHEN x THEN 1 WHEN true THEN 2 WHEN y THEN 3 END
        let rex = case(
            vec![
                (var("x"), Rex::lit(1_i64)),
                (Rex::lit(true), Rex::lit(2_i64)),
                (var("y"), Rex::lit(3_i64)),
            ],
            Rex::lit(ScalarValue::Null),
        );

        let expected = Rex::with_type(
            RexOp::Case {
                branches: vec![RexCaseBranch {
                    condition: var("x"),
                    result: Rex::lit(1_i64),
                }],
                default: Box::new(Rex::lit(2_i64)),
            },
            StaticType::Int64,
        );
        assert_eq!(expected, fold(rex));
    }

    #[test]
    fn case_unknown_untouched() {
        let rex = case(vec![(var("x"), Rex::lit(1_i64))], Rex::lit(2_i64));
        assert_eq!(rex.clone(), fold(rex));
    }

    #[test]
    fn struct_path_lookup() {
        // {'a': 1, 'b': 2}.a
        let rex = dot(
            struct_lit(vec![("a", Rex::lit(1_i64)), ("b", Rex::lit(2_i64))]),
            "a",
        );
        assert_eq!(Rex::lit(1_i64), fold(rex));
    }

    #[test]
    fn struct_path_duplicate_key_not_folded() {
        // {'a': 1, 'a': 2}.a
        let rex = dot(
            struct_lit(vec![("a", Rex::lit(1_i64)), ("a", Rex::lit(2_i64))]),
            "a",
        );
        assert_eq!(rex.clone(), fold(rex));
    }

    #[test]
    fn struct_path_absent_key_not_folded() {
        let rex = dot(struct_lit(vec![("a", Rex::lit(1_i64))]), "z");
        assert_eq!(rex.clone(), fold(rex));
    }

    #[test]
    fn path_key_case_sensitive() {
        let rex = Rex::new(RexOp::PathKey {
            root: Box::new(struct_lit(vec![("A", Rex::lit(1_i64)), ("a", Rex::lit(2_i64))])),
            key: Box::new(Rex::lit("a")),
        });
        assert_eq!(Rex::lit(2_i64), fold(rex));
    }

    #[test]
    fn not_literal() {
        assert_eq!(Rex::lit(false), fold(call("not", vec![Rex::lit(true)])));
        assert_eq!(
            Rex::lit(ScalarValue::Missing),
            fold(call("not", vec![Rex::lit(ScalarValue::Missing)]))
        );
    }

    #[test]
    fn eq_identical_expressions() {
        let rex = call("eq", vec![var("x"), var("x")]);
        assert_eq!(Rex::lit(true), fold(rex));
    }

    #[test]
    fn eq_literals() {
        assert_eq!(
            Rex::lit(false),
            fold(call("eq", vec![Rex::lit(1_i64), Rex::lit(2_i64)]))
        );
        assert_eq!(
            Rex::lit(ScalarValue::Null),
            fold(call("eq", vec![Rex::lit(ScalarValue::Null), Rex::lit(2_i64)]))
        );
    }

    #[test]
    fn eq_identical_null_literals() {
        let null = Rex::lit(ScalarValue::Null);
        assert_eq!(Rex::lit(true), fold(call("eq", vec![null.clone(), null])));
    }

    #[test]
    fn eq_identical_missing_literals() {
        let missing = Rex::lit(ScalarValue::Missing);
        assert_eq!(
            Rex::lit(true),
            fold(call("eq", vec![missing.clone(), missing]))
        );
    }

    #[test]
    fn eq_different_expressions_untouched() {
        let rex = call("eq", vec![var("x"), var("y")]);
        assert_eq!(rex.clone(), fold(rex));
    }

    #[test]
    fn is_struct_by_type() {
        let arg = Rex::with_type(
            RexOp::Var(VarRef::Local { depth: 0, index: 0 }),
            StaticType::open_struct(),
        );
        assert_eq!(Rex::lit(true), fold(call("is_struct", vec![arg])));

        let arg = Rex::with_type(RexOp::Var(VarRef::Local { depth: 0, index: 0 }), StaticType::Int32);
        assert_eq!(Rex::lit(false), fold(call("is_struct", vec![arg])));

        // Unknown until run time.
        let rex = call("is_struct", vec![Rex::local(0, 0)]);
        assert_eq!(rex.clone(), fold(rex));
    }

    #[test]
    fn tuple_union_of_struct_literals() {
        let rex = Rex::new(RexOp::TupleUnion {
            args: vec![
                struct_lit(vec![("a", Rex::lit(1_i64))]),
                struct_lit(vec![("b", Rex::lit("x"))]),
            ],
        });

        let expected = Rex::with_type(
            RexOp::Struct {
                fields: vec![
                    RexStructField {
                        key: Rex::lit("a"),
                        value: Rex::lit(1_i64),
                    },
                    RexStructField {
                        key: Rex::lit("b"),
                        value: Rex::lit("x"),
                    },
                ],
            },
            StaticType::closed_struct([
                StructField::new("a", StaticType::Int64),
                StructField::new("b", StaticType::String),
            ]),
        );
        assert_eq!(expected, fold(rex));
    }

    #[test]
    fn tuple_union_of_closed_variable() {
        let x = Rex::with_type(
            RexOp::Var(VarRef::Local { depth: 0, index: 0 }),
            StaticType::closed_struct([StructField::new("a", StaticType::Int32)]),
        );
        let rex = Rex::new(RexOp::TupleUnion { args: vec![x] });

        let folded = fold(rex);
        let RexOp::Struct { fields } = &folded.op else {
            panic!("expected struct: {folded}");
        };
        assert_eq!(1, fields.len());
        assert_eq!(StaticType::Int32, fields[0].value.ty);
    }

    #[test]
    fn tuple_union_open_not_folded() {
        let x = Rex::with_type(RexOp::Var(VarRef::Local { depth: 0, index: 0 }), StaticType::open_struct());
        let rex = Rex::new(RexOp::TupleUnion { args: vec![x] });
        assert_eq!(rex.clone(), fold(rex));
    }

    #[test]
    fn nested_folding() {
        // NOT(CASE WHEN false THEN x ELSE {'a': true}.a END)
        let inner = case(
            vec![(Rex::lit(false), var("x"))],
            dot(struct_lit(vec![("a", Rex::lit(true))]), "a"),
        );
        assert_eq!(Rex::lit(false), fold(call("not", vec![inner])));
    }

    #[test]
    fn idempotent() {
        let exprs = vec![
            case(
                vec![
                    (var("x"), Rex::lit(1_i64)),
                    (Rex::lit(true), Rex::lit(2_i64)),
                ],
                Rex::lit(3_i64),
            ),
            dot(
                struct_lit(vec![("a", Rex::lit(1_i64)), ("a", Rex::lit(2_i64))]),
                "a",
            ),
            call("eq", vec![var("x"), var("x")]),
            call("not", vec![call("eq", vec![var("x"), var("y")])]),
            Rex::new(RexOp::TupleUnion {
                args: vec![struct_lit(vec![("a", var("x"))]), struct_lit(vec![])],
            }),
        ];

        for expr in exprs {
            let once = fold(expr);
            let twice = fold(once.clone());
            assert_eq!(once, twice, "{once}");
        }
    }
}
