use std::fmt;

use crate::delimiters::Delimiters;
use crate::errors::Error;
use crate::utils::Span;

// Handwritten two-state lexer. In template state we only look for the start
// delimiter and everything before it is literal content. In directive state
// we emit the usual expression/statement tokens until the end delimiter.

fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[derive(Clone, Copy, PartialEq)]
pub(crate) enum Token<'a> {
    /// Literal template text outside of directives
    Content(&'a str),
    /// A start delimiter; `interpolation` is true when it was followed by `=`
    DirectiveStart { interpolation: bool },
    /// An end delimiter
    DirectiveEnd,

    Ident(&'a str),
    /// The slice between the quotes, escapes not yet processed
    String(&'a str),
    Integer(i64),
    Float(f64),

    // math
    Mul,
    Div,
    Mod,
    Plus,
    Minus,

    // comparisons
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equal,
    NotEqual,

    // logic
    And,
    Or,
    Bang,

    Assign,
    Increment,
    Decrement,

    Dot,
    Comma,
    Semicolon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
}

impl<'a> fmt::Debug for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Content(s) => write!(f, "CONTENT({s:?})"),
            Token::DirectiveStart { interpolation } => {
                write!(f, "DIRECTIVE_START({interpolation})")
            }
            Token::DirectiveEnd => write!(f, "DIRECTIVE_END"),
            Token::Ident(i) => write!(f, "IDENT({i})"),
            Token::String(s) => write!(f, "STRING({s:?})"),
            Token::Integer(i) => write!(f, "INTEGER({i:?})"),
            Token::Float(v) => write!(f, "FLOAT({v:?})"),
            Token::Mul => write!(f, "MUL"),
            Token::Div => write!(f, "DIV"),
            Token::Mod => write!(f, "MOD"),
            Token::Plus => write!(f, "PLUS"),
            Token::Minus => write!(f, "MINUS"),
            Token::LessThan => write!(f, "LT"),
            Token::GreaterThan => write!(f, "GT"),
            Token::LessThanOrEqual => write!(f, "LTE"),
            Token::GreaterThanOrEqual => write!(f, "GTE"),
            Token::Equal => write!(f, "EQ"),
            Token::NotEqual => write!(f, "NE"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Bang => write!(f, "BANG"),
            Token::Assign => write!(f, "ASSIGN"),
            Token::Increment => write!(f, "INCREMENT"),
            Token::Decrement => write!(f, "DECREMENT"),
            Token::Dot => write!(f, "DOT"),
            Token::Comma => write!(f, "COMMA"),
            Token::Semicolon => write!(f, "SEMICOLON"),
            Token::LeftParen => write!(f, "LEFT_PAREN"),
            Token::RightParen => write!(f, "RIGHT_PAREN"),
            Token::LeftBracket => write!(f, "LEFT_BRACKET"),
            Token::RightBracket => write!(f, "RIGHT_BRACKET"),
            Token::LeftBrace => write!(f, "LEFT_BRACE"),
            Token::RightBrace => write!(f, "RIGHT_BRACE"),
        }
    }
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Content(_) => write!(f, "some template content"),
            Token::DirectiveStart { interpolation: true } => write!(f, "`=` directive start"),
            Token::DirectiveStart { interpolation: false } => write!(f, "directive start"),
            Token::DirectiveEnd => write!(f, "directive end"),
            Token::Ident(i) => write!(f, "`{i}`"),
            Token::String(s) => write!(f, "string {s:?}"),
            Token::Integer(i) => write!(f, "integer `{i}`"),
            Token::Float(v) => write!(f, "float `{v}`"),
            Token::Mul => write!(f, "`*`"),
            Token::Div => write!(f, "`/`"),
            Token::Mod => write!(f, "`%`"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::LessThan => write!(f, "`<`"),
            Token::GreaterThan => write!(f, "`>`"),
            Token::LessThanOrEqual => write!(f, "`<=`"),
            Token::GreaterThanOrEqual => write!(f, "`>=`"),
            Token::Equal => write!(f, "`==`"),
            Token::NotEqual => write!(f, "`!=`"),
            Token::And => write!(f, "`&&`"),
            Token::Or => write!(f, "`||`"),
            Token::Bang => write!(f, "`!`"),
            Token::Assign => write!(f, "`=`"),
            Token::Increment => write!(f, "`++`"),
            Token::Decrement => write!(f, "`--`"),
            Token::Dot => write!(f, "`.`"),
            Token::Comma => write!(f, "`,`"),
            Token::Semicolon => write!(f, "`;`"),
            Token::LeftParen => write!(f, "`(`"),
            Token::RightParen => write!(f, "`)`"),
            Token::LeftBracket => write!(f, "`[`"),
            Token::RightBracket => write!(f, "`]`"),
            Token::LeftBrace => write!(f, "`{{`"),
            Token::RightBrace => write!(f, "`}}`"),
        }
    }
}

pub(crate) fn tokenize<'a>(
    source: &'a str,
    delimiters: Delimiters,
) -> impl Iterator<Item = Result<(Token<'a>, Span), Error>> + 'a {
    let start_delim = delimiters.start;
    let end_delim = delimiters.end;
    let mut rest = source;
    let mut in_directive = false;
    let mut current_line = 1;
    let mut current_col = 0;
    let mut current_byte = 0;
    let mut errored = false;

    macro_rules! syntax_error {
        ($message:expr, $span:expr) => {{
            errored = true;
            return Some(Err(Error::syntax_error($message.to_string(), &$span)));
        }};
    }

    macro_rules! loc {
        () => {
            (current_line, current_col, current_byte)
        };
    }

    macro_rules! make_span {
        ($start:expr) => {{
            let (start_line, start_col, start_byte) = $start;
            Span {
                start_line,
                start_col,
                end_line: current_line,
                end_col: current_col,
                range: start_byte..current_byte,
            }
        }};
    }

    macro_rules! advance {
        ($num_bytes:expr) => {{
            let (skipped, new_rest) = rest.split_at($num_bytes);
            for c in skipped.chars() {
                current_byte += c.len_utf8();
                match c {
                    '\n' => {
                        current_line += 1;
                        current_col = 0;
                    }
                    _ => current_col += 1,
                }
            }
            rest = new_rest;
            skipped
        }};
    }

    macro_rules! single {
        ($token:expr, $start:expr) => {{
            advance!(1);
            return Some(Ok(($token, make_span!($start))));
        }};
    }

    macro_rules! double {
        ($token:expr, $start:expr) => {{
            advance!(2);
            return Some(Ok(($token, make_span!($start))));
        }};
    }

    std::iter::from_fn(move || loop {
        if rest.is_empty() || errored {
            return None;
        }

        let start_loc = loc!();

        if !in_directive {
            match memstr(rest.as_bytes(), start_delim.as_bytes()) {
                Some(0) => {
                    // A start marker without any end marker after it is not a
                    // directive: the remainder of the template is literal text.
                    if memstr(&rest.as_bytes()[start_delim.len()..], end_delim.as_bytes())
                        .is_none()
                    {
                        let content = advance!(rest.len());
                        return Some(Ok((Token::Content(content), make_span!(start_loc))));
                    }
                    advance!(start_delim.len());
                    let interpolation = rest.as_bytes().first() == Some(&b'=');
                    if interpolation {
                        advance!(1);
                    }
                    in_directive = true;
                    return Some(Ok((
                        Token::DirectiveStart { interpolation },
                        make_span!(start_loc),
                    )));
                }
                Some(idx) => {
                    let content = advance!(idx);
                    return Some(Ok((Token::Content(content), make_span!(start_loc))));
                }
                None => {
                    let content = advance!(rest.len());
                    return Some(Ok((Token::Content(content), make_span!(start_loc))));
                }
            }
        }

        // Directive state: whitespace is insignificant
        let num_ws = rest
            .as_bytes()
            .iter()
            .take_while(|c| c.is_ascii_whitespace())
            .count();
        if num_ws > 0 {
            advance!(num_ws);
            continue;
        }

        // The end marker wins over any token it could be a prefix of
        if rest.starts_with(end_delim) {
            advance!(end_delim.len());
            in_directive = false;
            return Some(Ok((Token::DirectiveEnd, make_span!(start_loc))));
        }

        let bytes = rest.as_bytes();
        match bytes[0] {
            b'\'' | b'"' => {
                let quote = bytes[0];
                let mut i = 1;
                let mut terminated = false;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 2,
                        c if c == quote => {
                            terminated = true;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                if !terminated {
                    syntax_error!(
                        format!(
                            "String opened with `{0}` is missing its closing `{0}`",
                            quote as char
                        ),
                        make_span!(start_loc)
                    );
                }
                let s = advance!(i + 1);
                return Some(Ok((
                    Token::String(&s[1..s.len() - 1]),
                    make_span!(start_loc),
                )));
            }
            b'0'..=b'9' => {
                let mut is_float = false;
                let num_len = bytes
                    .iter()
                    .take_while(|&&c| {
                        if !is_float && c == b'.' {
                            is_float = true;
                            true
                        } else {
                            c.is_ascii_digit()
                        }
                    })
                    .count();
                let num = advance!(num_len);
                if is_float {
                    return Some(Ok((
                        Token::Float(match num.parse::<f64>() {
                            Ok(val) => val,
                            Err(_) => syntax_error!("Invalid float", make_span!(start_loc)),
                        }),
                        make_span!(start_loc),
                    )));
                } else {
                    return Some(Ok((
                        Token::Integer(match num.parse::<i64>() {
                            Ok(val) => val,
                            Err(_) => syntax_error!("Invalid integer", make_span!(start_loc)),
                        }),
                        make_span!(start_loc),
                    )));
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let ident_len = bytes
                    .iter()
                    .take_while(|&&c| c.is_ascii_alphanumeric() || c == b'_')
                    .count();
                let ident = advance!(ident_len);
                return Some(Ok((Token::Ident(ident), make_span!(start_loc))));
            }
            b'+' => {
                if bytes.get(1) == Some(&b'+') {
                    double!(Token::Increment, start_loc);
                }
                single!(Token::Plus, start_loc);
            }
            b'-' => {
                if bytes.get(1) == Some(&b'-') {
                    double!(Token::Decrement, start_loc);
                }
                single!(Token::Minus, start_loc);
            }
            b'*' => single!(Token::Mul, start_loc),
            b'/' => single!(Token::Div, start_loc),
            b'%' => single!(Token::Mod, start_loc),
            b'=' => {
                if bytes.get(1) == Some(&b'=') {
                    double!(Token::Equal, start_loc);
                }
                single!(Token::Assign, start_loc);
            }
            b'!' => {
                if bytes.get(1) == Some(&b'=') {
                    double!(Token::NotEqual, start_loc);
                }
                single!(Token::Bang, start_loc);
            }
            b'<' => {
                if bytes.get(1) == Some(&b'=') {
                    double!(Token::LessThanOrEqual, start_loc);
                }
                single!(Token::LessThan, start_loc);
            }
            b'>' => {
                if bytes.get(1) == Some(&b'=') {
                    double!(Token::GreaterThanOrEqual, start_loc);
                }
                single!(Token::GreaterThan, start_loc);
            }
            b'&' => {
                if bytes.get(1) == Some(&b'&') {
                    double!(Token::And, start_loc);
                }
                advance!(1);
                syntax_error!("Found `&`, did you mean `&&`?", make_span!(start_loc));
            }
            b'|' => {
                if bytes.get(1) == Some(&b'|') {
                    double!(Token::Or, start_loc);
                }
                advance!(1);
                syntax_error!("Found `|`, did you mean `||`?", make_span!(start_loc));
            }
            b'.' => single!(Token::Dot, start_loc),
            b',' => single!(Token::Comma, start_loc),
            b';' => single!(Token::Semicolon, start_loc),
            b'(' => single!(Token::LeftParen, start_loc),
            b')' => single!(Token::RightParen, start_loc),
            b'[' => single!(Token::LeftBracket, start_loc),
            b']' => single!(Token::RightBracket, start_loc),
            b'{' => single!(Token::LeftBrace, start_loc),
            b'}' => single!(Token::RightBrace, start_loc),
            _ => {
                let c = rest.chars().next().expect("rest is not empty");
                advance!(c.len_utf8());
                syntax_error!(
                    format!("Unexpected character `{c}` in directive"),
                    make_span!(start_loc)
                );
            }
        }
    })
}
