use serde_json::Value;

use crate::delimiters::Delimiters;
use crate::errors::{Error, ErrorKind, ReportError, TmpletResult};
use crate::parsing::ast::{
    BinaryOperation, BinaryOperator, Expression, ForC, GetAttr, GetItem, If, Node, Set,
    UnaryOperation, UnaryOperator, Var, While,
};
use crate::parsing::lexer::{tokenize, Token};
use crate::utils::{Span, Spanned};

/// parse_expression can call itself max 100 times, after that it's an error
const MAX_EXPR_RECURSION: usize = 100;

// From https://matklad.github.io/2020/04/13/simple-but-powerful-pratt-parsing.html

fn unary_binding_power(op: UnaryOperator) -> ((), u8) {
    use UnaryOperator::*;

    match op {
        Not => ((), 3),
        Minus => ((), 20),
    }
}

fn binary_binding_power(op: BinaryOperator) -> (u8, u8) {
    use BinaryOperator::*;

    match op {
        Or => (1, 2),
        And => (3, 4),
        Equal | NotEqual | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => (7, 8),
        Plus | Minus => (11, 12),
        Mul | Div | Mod => (13, 14),
    }
}

macro_rules! expect_token {
    ($parser:expr, $match:pat, $expectation:expr) => {{
        match $parser.next_or_error()? {
            (token, span) if matches!(token, $match) => Ok((token, span)),
            (token, _) => Err(Error::syntax_error(
                format!("Found {} but expected {}.", token, $expectation),
                &$parser.current_span,
            )),
        }
    }};
    ($parser:expr, $match:pat => $target:expr, $expectation:expr) => {{
        match $parser.next_or_error()? {
            ($match, span) => Ok(($target, span)),
            (token, _) => Err(Error::syntax_error(
                format!("Found {} but expected {}.", token, $expectation),
                &$parser.current_span,
            )),
        }
    }};
}

const RESERVED_NAMES: [&str; 11] = [
    "true", "false", "null", "var", "if", "else", "while", "for", "break", "continue", "print",
];

/// A control-flow statement whose `{` has been seen but whose `}` has not.
/// Its body keeps growing as we parse more segments, possibly across several
/// code directives.
#[derive(Debug)]
enum OpenBody {
    If {
        condition: Expression,
        body: Vec<Node>,
        false_body: Vec<Node>,
        in_else: bool,
    },
    While {
        condition: Expression,
        body: Vec<Node>,
    },
    ForC {
        init: Option<Set>,
        condition: Option<Expression>,
        step: Option<Set>,
        body: Vec<Node>,
    },
}

pub(crate) struct Parser<'a> {
    lexer: Box<dyn Iterator<Item = Result<(Token<'a>, Span), Error>> + 'a>,
    // The next token/span tuple.
    next: Option<Result<(Token<'a>, Span), Error>>,
    // We keep track of the current span
    current_span: Span,
    // Control-flow bodies opened but not yet closed with `}`
    body_stack: Vec<OpenBody>,
    // We limit the length of an expression to avoid stack overflows with crazy expressions like
    // 100 `(`
    num_expr_calls: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, delimiters: Delimiters) -> Self {
        let mut lexer: Box<dyn Iterator<Item = Result<(Token<'a>, Span), Error>> + 'a> =
            Box::new(tokenize(source, delimiters));
        let next = lexer.next();
        Self {
            lexer,
            next,
            current_span: Span::default(),
            body_stack: Vec::new(),
            num_expr_calls: 0,
            nodes: Vec::new(),
        }
    }

    fn next(&mut self) -> TmpletResult<Option<(Token<'a>, Span)>> {
        let cur = self.next.take();
        self.next = self.lexer.next();
        if let Some(Ok((_, ref span))) = cur {
            self.current_span = span.clone();
        }

        cur.transpose()
    }

    fn eoi(&self) -> Error {
        // The EOI is after the current span
        let mut span = self.current_span.clone();
        span.start_col = span.end_col;
        span.start_line = span.end_line;
        Error::new(ErrorKind::SyntaxError(
            ReportError::unexpected_end_of_input(&span),
        ))
    }

    fn next_or_error(&mut self) -> TmpletResult<(Token<'a>, Span)> {
        match self.next()? {
            None => Err(self.eoi()),
            Some(c) => Ok(c),
        }
    }

    fn is_in_loop(&self) -> bool {
        self.body_stack
            .iter()
            .any(|b| matches!(b, OpenBody::While { .. } | OpenBody::ForC { .. }))
    }

    /// Appends a finished node to the innermost open body, or to the template
    /// itself when no block is open.
    fn push_node(&mut self, node: Node) {
        match self.body_stack.last_mut() {
            Some(OpenBody::If {
                body,
                false_body,
                in_else,
                ..
            }) => {
                if *in_else {
                    false_body.push(node);
                } else {
                    body.push(node);
                }
            }
            Some(OpenBody::While { body, .. }) | Some(OpenBody::ForC { body, .. }) => {
                body.push(node);
            }
            None => self.nodes.push(node),
        }
    }

    fn ensure_not_reserved(&self, name: &str, span: &Span) -> TmpletResult<()> {
        if RESERVED_NAMES.contains(&name) {
            return Err(Error::syntax_error(
                format!("`{name}` is a reserved name and cannot be assigned to"),
                span,
            ));
        }
        Ok(())
    }

    /// Everything after the variable of an assignment: `= expr`, `++` or `--`.
    fn parse_assign_tail(&mut self, name: &str, ident_span: Span) -> TmpletResult<Set> {
        self.ensure_not_reserved(name, &ident_span)?;
        let (token, _) = self.next_or_error()?;
        let value = match token {
            Token::Assign => self.parse_expression(0)?,
            Token::Increment | Token::Decrement => {
                let op = if token == Token::Increment {
                    BinaryOperator::Plus
                } else {
                    BinaryOperator::Minus
                };
                let mut span = ident_span.clone();
                span.expand(&self.current_span);
                Expression::BinaryOperation(Spanned::new(
                    BinaryOperation {
                        op,
                        left: Expression::Var(Spanned::new(
                            Var {
                                name: name.to_string(),
                            },
                            ident_span.clone(),
                        )),
                        right: Expression::Const(Spanned::new(
                            Value::from(1),
                            self.current_span.clone(),
                        )),
                    },
                    span,
                ))
            }
            token => {
                return Err(Error::syntax_error(
                    format!("Found {token} but expected `=`, `++` or `--`."),
                    &self.current_span,
                ));
            }
        };

        Ok(Set {
            name: name.to_string(),
            value,
        })
    }

    /// An assignment clause as found in a `for` header: `[var] x = expr`,
    /// `x++` or `x--`.
    fn parse_assign_clause(&mut self) -> TmpletResult<Set> {
        if matches!(self.next, Some(Ok((Token::Ident("var"), _)))) {
            self.next_or_error()?;
        }
        let (name, span) = expect_token!(self, Token::Ident(id) => id, "identifier")?;
        self.parse_assign_tail(name, span)
    }

    /// `var a = 1, b = 'x'` declares (well, assigns) one variable per comma
    /// separated clause.
    fn parse_var_declarations(&mut self) -> TmpletResult<()> {
        loop {
            let (name, span) = expect_token!(self, Token::Ident(id) => id, "identifier")?;
            let set = self.parse_assign_tail(name, span)?;
            self.push_node(Node::Set(set));

            if matches!(self.next, Some(Ok((Token::Comma, _)))) {
                self.next_or_error()?;
                continue;
            }
            break;
        }
        Ok(())
    }

    /// The argument list of `print(...)`: zero or more comma separated
    /// expressions, appended to the output in order.
    fn parse_print(&mut self, mut start_span: Span) -> TmpletResult<Node> {
        expect_token!(self, Token::LeftParen, "(")?;
        let mut args = Vec::new();

        loop {
            if matches!(self.next, Some(Ok((Token::RightParen, _)))) {
                break;
            }
            args.push(self.parse_expression(0)?);
            match &self.next {
                Some(Ok((Token::Comma, _))) => {
                    self.next_or_error()?;
                }
                Some(Ok((Token::RightParen, _))) => break,
                _ => {
                    let (token, _) = self.next_or_error()?;
                    return Err(Error::syntax_error(
                        format!("Found {token} but expected `,` or `)`."),
                        &self.current_span,
                    ));
                }
            }
        }

        expect_token!(self, Token::RightParen, ")")?;
        start_span.expand(&self.current_span);
        Ok(Node::Print(Spanned::new(args, start_span)))
    }

    /// A parenthesized condition, as required after `if` and `while`
    fn parse_condition(&mut self) -> TmpletResult<Expression> {
        expect_token!(self, Token::LeftParen, "(")?;
        let expr = self.parse_expression(0)?;
        expect_token!(self, Token::RightParen, ")")?;
        Ok(expr)
    }

    fn parse_for(&mut self) -> TmpletResult<()> {
        expect_token!(self, Token::LeftParen, "(")?;

        let init = if matches!(self.next, Some(Ok((Token::Semicolon, _)))) {
            None
        } else {
            Some(self.parse_assign_clause()?)
        };
        expect_token!(self, Token::Semicolon, "`;`")?;

        let condition = if matches!(self.next, Some(Ok((Token::Semicolon, _)))) {
            None
        } else {
            Some(self.parse_expression(0)?)
        };
        expect_token!(self, Token::Semicolon, "`;`")?;

        let step = if matches!(self.next, Some(Ok((Token::RightParen, _)))) {
            None
        } else {
            Some(self.parse_assign_clause()?)
        };
        expect_token!(self, Token::RightParen, ")")?;
        expect_token!(self, Token::LeftBrace, "{")?;

        self.body_stack.push(OpenBody::ForC {
            init,
            condition,
            step,
            body: Vec::new(),
        });
        Ok(())
    }

    /// Handles a `}`: closes the innermost open body. For an `if`, a directly
    /// following `else {` keeps it open and switches to the false branch
    /// instead.
    fn close_body(&mut self) -> TmpletResult<()> {
        match self.body_stack.pop() {
            None => Err(Error::syntax_error(
                "Found `}` without a matching `{`".to_string(),
                &self.current_span,
            )),
            Some(OpenBody::If {
                condition,
                body,
                false_body,
                in_else,
            }) => {
                if !in_else && matches!(self.next, Some(Ok((Token::Ident("else"), _)))) {
                    self.next_or_error()?;
                    expect_token!(self, Token::LeftBrace, "{")?;
                    self.body_stack.push(OpenBody::If {
                        condition,
                        body,
                        false_body,
                        in_else: true,
                    });
                } else {
                    self.push_node(Node::If(If {
                        condition,
                        body,
                        false_body,
                    }));
                }
                Ok(())
            }
            Some(OpenBody::While { condition, body }) => {
                self.push_node(Node::While(While { condition, body }));
                Ok(())
            }
            Some(OpenBody::ForC {
                init,
                condition,
                step,
                body,
            }) => {
                self.push_node(Node::ForC(ForC {
                    init,
                    condition,
                    step,
                    body,
                }));
                Ok(())
            }
        }
    }

    fn parse_statement(&mut self) -> TmpletResult<()> {
        self.num_expr_calls = 0;
        let (token, span) = self.next_or_error()?;
        match token {
            Token::Ident("print") => {
                let node = self.parse_print(span)?;
                self.push_node(node);
                Ok(())
            }
            Token::Ident("var") => self.parse_var_declarations(),
            Token::Ident("if") => {
                let condition = self.parse_condition()?;
                expect_token!(self, Token::LeftBrace, "{")?;
                self.body_stack.push(OpenBody::If {
                    condition,
                    body: Vec::new(),
                    false_body: Vec::new(),
                    in_else: false,
                });
                Ok(())
            }
            Token::Ident("while") => {
                let condition = self.parse_condition()?;
                expect_token!(self, Token::LeftBrace, "{")?;
                self.body_stack.push(OpenBody::While {
                    condition,
                    body: Vec::new(),
                });
                Ok(())
            }
            Token::Ident("for") => self.parse_for(),
            Token::Ident("break") => {
                if !self.is_in_loop() {
                    return Err(Error::syntax_error(
                        "`break` can only be used inside a loop".to_string(),
                        &span,
                    ));
                }
                self.push_node(Node::Break);
                Ok(())
            }
            Token::Ident("continue") => {
                if !self.is_in_loop() {
                    return Err(Error::syntax_error(
                        "`continue` can only be used inside a loop".to_string(),
                        &span,
                    ));
                }
                self.push_node(Node::Continue);
                Ok(())
            }
            Token::Ident("else") => Err(Error::syntax_error(
                "Found `else` without a `}` closing an `if` right before it".to_string(),
                &span,
            )),
            Token::Ident(name) => {
                let set = self.parse_assign_tail(name, span)?;
                self.push_node(Node::Set(set));
                Ok(())
            }
            Token::RightBrace => self.close_body(),
            token => Err(Error::syntax_error(
                format!("Found {token} but expected a statement"),
                &self.current_span,
            )),
        }
    }

    /// Parses statements until the end of the code directive. Blocks opened
    /// here can stay open: they are carried in `body_stack` until a later
    /// directive closes them.
    fn parse_code_directive(&mut self) -> TmpletResult<()> {
        loop {
            match &self.next {
                Some(Ok((Token::DirectiveEnd, _))) => {
                    self.next_or_error()?;
                    return Ok(());
                }
                Some(Ok((Token::Semicolon, _))) => {
                    self.next_or_error()?;
                }
                Some(Ok(_)) => self.parse_statement()?,
                Some(Err(_)) => {
                    self.next()?;
                    unreachable!("lexer errors are propagated by next()");
                }
                None => return Err(self.eoi()),
            }
        }
    }

    /// Just an ident or attribute/subscript chains on it
    fn parse_ident(&mut self, ident: &str, start_span: Span) -> TmpletResult<Expression> {
        let mut expr = Expression::Var(Spanned::new(
            Var {
                name: ident.to_string(),
            },
            start_span,
        ));

        loop {
            match self.next {
                Some(Ok((Token::Dot, _))) => {
                    expect_token!(self, Token::Dot, ".")?;
                    let (attr, attr_span) =
                        expect_token!(self, Token::Ident(id) => id, "identifier")?;
                    let mut span = expr.span().clone();
                    span.expand(&attr_span);
                    expr = Expression::GetAttr(Spanned::new(
                        GetAttr {
                            expr,
                            name: attr.to_string(),
                        },
                        span,
                    ));
                }
                Some(Ok((Token::LeftBracket, _))) => {
                    expect_token!(self, Token::LeftBracket, "[")?;
                    let sub_expr = self.parse_expression(0)?;
                    let mut span = expr.span().clone();
                    span.expand(&self.current_span);
                    expect_token!(self, Token::RightBracket, "]")?;
                    expr = Expression::GetItem(Spanned::new(GetItem { expr, sub_expr }, span));
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_expression(&mut self, min_bp: u8) -> TmpletResult<Expression> {
        self.num_expr_calls += 1;
        if self.num_expr_calls > MAX_EXPR_RECURSION {
            return Err(Error::syntax_error(
                "The expression is too complex".to_string(),
                &self.current_span,
            ));
        }

        let (token, mut span) = self.next_or_error()?;

        let mut lhs = match token {
            Token::Integer(i) => Expression::Const(Spanned::new(Value::from(i), span.clone())),
            Token::Float(f) => Expression::Const(Spanned::new(Value::from(f), span.clone())),
            Token::String(s) => {
                Expression::Const(Spanned::new(Value::from(strip_escapes(s)), span.clone()))
            }
            Token::Ident("true") => {
                Expression::Const(Spanned::new(Value::Bool(true), span.clone()))
            }
            Token::Ident("false") => {
                Expression::Const(Spanned::new(Value::Bool(false), span.clone()))
            }
            Token::Ident("null") => Expression::Const(Spanned::new(Value::Null, span.clone())),
            Token::Ident(ident) => self.parse_ident(ident, span.clone())?,
            Token::Minus | Token::Bang => {
                let op = match token {
                    Token::Minus => UnaryOperator::Minus,
                    Token::Bang => UnaryOperator::Not,
                    _ => unreachable!(),
                };
                match &self.next {
                    Some(Ok((Token::Minus, next_span))) | Some(Ok((Token::Bang, next_span))) => {
                        // Can't have unary with unary (eg - - - - - 1) otherwise we will quickly
                        // stack overflow. It doesn't make much sense anyway in practice.
                        return Err(Error::syntax_error(
                            "`-` and `!` cannot be used consecutively.".to_string(),
                            next_span,
                        ));
                    }
                    _ => (),
                }

                let (_, r_bp) = unary_binding_power(op);
                let expr = self.parse_expression(r_bp)?;
                span.expand(&self.current_span);
                Expression::UnaryOperation(Spanned::new(UnaryOperation { op, expr }, span.clone()))
            }
            Token::LeftParen => {
                let mut lhs = self.parse_expression(0)?;
                expect_token!(self, Token::RightParen, ")")?;
                lhs.expand_span(&self.current_span);
                lhs
            }
            _ => {
                return Err(Error::syntax_error(
                    format!(
                        "Found {token} but expected one of: integer, float, string, bool, null, ident, `-`, `!` or `(`"
                    ),
                    &self.current_span,
                ));
            }
        };

        while let Some(Ok((ref token, _))) = self.next {
            let op = match token {
                Token::Mul => BinaryOperator::Mul,
                Token::Div => BinaryOperator::Div,
                Token::Mod => BinaryOperator::Mod,
                Token::Plus => BinaryOperator::Plus,
                Token::Minus => BinaryOperator::Minus,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::And => BinaryOperator::And,
                Token::Or => BinaryOperator::Or,
                _ => break,
            };

            let (l_bp, r_bp) = binary_binding_power(op);
            if l_bp < min_bp {
                break;
            }

            // Advance past the op
            self.next_or_error()?;
            let right = self.parse_expression(r_bp)?;
            span.expand(&self.current_span);
            lhs = Expression::BinaryOperation(Spanned::new(
                BinaryOperation {
                    op,
                    left: lhs,
                    right,
                },
                span.clone(),
            ));
        }

        Ok(lhs)
    }

    pub(crate) fn parse(mut self) -> TmpletResult<Vec<Node>> {
        while let Some((token, span)) = self.next()? {
            match token {
                Token::Content(c) => {
                    let node = Node::Content(c.to_string());
                    self.push_node(node);
                }
                Token::DirectiveStart {
                    interpolation: true,
                } => {
                    self.num_expr_calls = 0;
                    let expr = self.parse_expression(0)?;
                    expect_token!(self, Token::DirectiveEnd, "the end of the directive")?;
                    self.push_node(Node::Expression(expr));
                }
                Token::DirectiveStart {
                    interpolation: false,
                } => self.parse_code_directive()?,
                token => {
                    return Err(Error::syntax_error(
                        format!("Found {token} outside of a directive"),
                        &span,
                    ));
                }
            }
        }

        if !self.body_stack.is_empty() {
            return Err(Error::syntax_error(
                "A block opened with `{` in a directive is never closed with `}`".to_string(),
                &self.current_span,
            ));
        }

        Ok(self.nodes)
    }
}

fn strip_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                // `\'`, `\"`, `\\` and anything else resolve to the char itself
                Some(other) => out.push(other),
                None => (),
            }
        } else {
            out.push(c);
        }
    }
    out
}
