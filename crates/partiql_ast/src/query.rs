use crate::expr::Expr;
use crate::location::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SetQuantifier {
    #[default]
    All,
    Distinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Select(Box<Select>),
    SetOp {
        op: SetOperator,
        quantifier: SetQuantifier,
        lhs: Box<Query>,
        rhs: Box<Query>,
    },
}

#[derive(Debug, Clone)]
pub struct Query {
    pub body: QueryBody,
    pub location: SourceLocation,
}

impl Query {
    pub fn new(body: QueryBody) -> Self {
        Query {
            body,
            location: SourceLocation::UNKNOWN,
        }
    }

    pub fn select(select: Select) -> Self {
        Self::new(QueryBody::Select(Box::new(select)))
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectItem {
    /// `x.*`
    All(Expr),
    /// `<expr> [AS alias]`
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    Star,
    /// `SELECT a, b AS c, x.*`
    List(Vec<ProjectItem>),
    /// `SELECT VALUE <expr>`
    Value(Expr),
    /// `PIVOT <value> AT <key>`
    Pivot { key: Expr, value: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FromSourceKind {
    /// Iterate over the elements of a collection.
    Scan,
    /// Iterate over the attributes of a struct.
    Unpivot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromSource {
    pub kind: FromSourceKind,
    pub expr: Expr,
    pub as_alias: Option<String>,
    pub at_alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Source(FromSource),
    /// Comma joins are represented as inner joins without a condition.
    Join {
        kind: JoinKind,
        lhs: Box<FromClause>,
        rhs: Box<FromClause>,
        condition: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub expr: Expr,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupingStrategy {
    #[default]
    Full,
    Partial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub strategy: GroupingStrategy,
    pub keys: Vec<GroupKey>,
    /// `GROUP AS <alias>`
    pub group_as: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub expr: Expr,
    pub direction: Option<OrderDirection>,
    pub nulls: Option<NullsOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub quantifier: SetQuantifier,
    pub projection: Projection,
    pub exclude: Vec<Expr>,
    pub from: Option<FromClause>,
    pub let_bindings: Vec<LetBinding>,
    pub where_clause: Option<Expr>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Expr>,
    pub order_by: Vec<SortSpec>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl Select {
    pub fn new(projection: Projection) -> Self {
        Select {
            quantifier: SetQuantifier::All,
            projection,
            exclude: Vec::new(),
            from: None,
            let_bindings: Vec::new(),
            where_clause: None,
            group_by: None,
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}
