use serde_json::Value;

use crate::utils::{Span, Spanned};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    // math
    Mul,
    Div,
    Mod,
    Plus,
    Minus,

    // comparison
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equal,
    NotEqual,

    // logic
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// A variable lookup by name
#[derive(Clone, Debug, PartialEq)]
pub struct Var {
    pub name: String,
}

/// `obj.field`
#[derive(Clone, Debug, PartialEq)]
pub struct GetAttr {
    pub expr: Expression,
    pub name: String,
}

/// `obj[expr]`
#[derive(Clone, Debug, PartialEq)]
pub struct GetItem {
    pub expr: Expression,
    pub sub_expr: Expression,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryOperation {
    pub op: UnaryOperator,
    pub expr: Expression,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryOperation {
    pub op: BinaryOperator,
    pub left: Expression,
    pub right: Expression,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Const(Spanned<Value>),
    Var(Spanned<Var>),
    GetAttr(Spanned<GetAttr>),
    GetItem(Spanned<GetItem>),
    UnaryOperation(Spanned<UnaryOperation>),
    BinaryOperation(Spanned<BinaryOperation>),
}

impl Expression {
    pub fn span(&self) -> &Span {
        match self {
            Expression::Const(s) => s.span(),
            Expression::Var(s) => s.span(),
            Expression::GetAttr(s) => s.span(),
            Expression::GetItem(s) => s.span(),
            Expression::UnaryOperation(s) => s.span(),
            Expression::BinaryOperation(s) => s.span(),
        }
    }

    pub(crate) fn expand_span(&mut self, span: &Span) {
        match self {
            Expression::Const(s) => s.span_mut().expand(span),
            Expression::Var(s) => s.span_mut().expand(span),
            Expression::GetAttr(s) => s.span_mut().expand(span),
            Expression::GetItem(s) => s.span_mut().expand(span),
            Expression::UnaryOperation(s) => s.span_mut().expand(span),
            Expression::BinaryOperation(s) => s.span_mut().expand(span),
        }
    }
}

/// `x = expr`, with or without the `var` keyword, and the `x++`/`x--` sugar
#[derive(Clone, Debug, PartialEq)]
pub struct Set {
    pub name: String,
    pub value: Expression,
}

#[derive(Clone, Debug, PartialEq)]
pub struct If {
    pub condition: Expression,
    pub body: Vec<Node>,
    pub false_body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct While {
    pub condition: Expression,
    pub body: Vec<Node>,
}

/// A C-style `for (init; cond; step)` loop. All three parts are optional;
/// a missing condition loops until a `break`.
#[derive(Clone, Debug, PartialEq)]
pub struct ForC {
    pub init: Option<Set>,
    pub condition: Option<Expression>,
    pub step: Option<Set>,
    pub body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Literal template text between directives
    Content(String),
    /// An interpolation directive: evaluate and write
    Expression(Expression),
    /// The `print(...)` output primitive of code directives
    Print(Spanned<Vec<Expression>>),
    Set(Set),
    If(If),
    While(While),
    ForC(ForC),
    Break,
    Continue,
}
