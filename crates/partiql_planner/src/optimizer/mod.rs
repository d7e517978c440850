pub mod const_fold;

use partiql_error::Result;

use crate::plan::{LogicalPlan, Rel, Rex};
use crate::value::ScalarValue;

pub trait ExpressionRewriteRule {
    /// Rewrite a single expression.
    ///
    /// If the rewrite doesn't apply, then the expression should be returned
    /// unmodified.
    fn rewrite(expression: Rex) -> Result<Rex>;
}

/// Apply a rewrite rule to every expression in a plan, including the
/// expressions of nested relations.
pub fn rewrite_plan<R: ExpressionRewriteRule>(plan: LogicalPlan) -> Result<LogicalPlan> {
    Ok(LogicalPlan {
        root: rewrite_rex::<R>(plan.root)?,
    })
}

fn rewrite_rex<R: ExpressionRewriteRule>(mut rex: Rex) -> Result<Rex> {
    rewrite_nested_rels::<R>(&mut rex)?;
    R::rewrite(rex)
}

fn rewrite_nested_rels<R: ExpressionRewriteRule>(rex: &mut Rex) -> Result<()> {
    if let Some(rel) = rex.rel_mut() {
        rewrite_rel::<R>(rel)?;
    }

    rex.for_each_child_mut(&mut |child| rewrite_nested_rels::<R>(child))
}

fn rewrite_rel<R: ExpressionRewriteRule>(rel: &mut Rel) -> Result<()> {
    rel.for_each_child_mut(&mut |child| rewrite_rel::<R>(child))?;
    rel.for_each_expr_mut(&mut |expr| {
        let orig = std::mem::replace(expr, Rex::lit(ScalarValue::Missing));
        *expr = rewrite_rex::<R>(orig)?;
        Ok(())
    })
}
