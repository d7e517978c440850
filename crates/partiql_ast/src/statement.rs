use crate::expr::Expr;
use crate::identifier::Identifier;
use crate::location::SourceLocation;
use crate::query::Query;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(Query),
    Dml(Dml),
    Ddl(Ddl),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DmlOperation {
    Insert { value: Expr },
    Delete,
    Remove,
    Set { assignments: Vec<(Expr, Expr)> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnConflictAction {
    DoNothing,
    DoReplace,
    DoUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    pub condition: Option<Expr>,
    pub action: OnConflictAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dml {
    pub operation: DmlOperation,
    pub target: Expr,
    pub where_clause: Option<Expr>,
    pub on_conflict: Option<OnConflict>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DdlOperation {
    CreateTable { name: Identifier },
    DropTable { name: Identifier },
    CreateIndex { table: Identifier, fields: Vec<Expr> },
    DropIndex { table: Identifier, index: Identifier },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ddl {
    pub operation: DdlOperation,
    pub location: SourceLocation,
}
