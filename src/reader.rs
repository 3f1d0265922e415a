//! Reader: turns source text into [`Value`] trees.
//!
//! Grammar:
//!
//! ```text
//! expr   = number | symbol | string | sexpr | qexpr
//! sexpr  = "(" expr* ")"
//! qexpr  = "[" expr* "]"
//! number = [+-]? digit+ ("." digit+)? ([eE] [+-]? digit+)?
//! symbol = (letter | digit | one of "_+\:-*/=|!&%<>")+
//! string = '"' (any char except '"')* '"'
//! ```
//!
//! Numbers take priority over symbols: `-5` is a number and `-` a symbol. A token that
//! starts like a number but is not one (`12abc`, `1.2.3`) is a syntax error rather than
//! a symbol. Strings have no escape sequences.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace0, not_line_ending, one_of},
    combinator::{all_consuming, opt, recognize},
    error::ErrorKind,
};

use crate::ast::{NumberType, SYMBOL_SPECIAL_CHARS, Value};
use crate::{Error, MAX_PARSE_DEPTH, ParseConfig, ParseError, ParseErrorKind};

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Characters that may appear in a number or symbol token
fn is_token_char(c: char) -> bool {
    is_symbol_char(c) || c == '.'
}

fn starts_like_number(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn failure(input: &str, code: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, code))
}

/// Once inside a bracket, any error is final; there is nothing to backtrack to.
fn into_failure(error: nom::Err<nom::error::Error<&str>>) -> nom::Err<nom::error::Error<&str>> {
    match error {
        nom::Err::Error(e) => nom::Err::Failure(e),
        other => other,
    }
}

/// Skip whitespace and, when enabled, `;` line comments
fn skip_trivia(input: &str, config: ParseConfig) -> IResult<&str, ()> {
    let (mut rest, _) = multispace0.parse(input)?;
    while config.handle_comments && rest.starts_with(';') {
        let (after_comment, _) = not_line_ending.parse(rest)?;
        (rest, _) = multispace0.parse(after_comment)?;
    }
    Ok((rest, ()))
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(one_of("+-")),
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

/// Parse a number or a symbol
fn parse_atom(input: &str) -> IResult<&str, Value> {
    let (rest, token) = take_while1(is_token_char).parse(input)?;

    if starts_like_number(token) {
        let literal = all_consuming(number_literal)
            .parse(token)
            .map(|(_, literal)| literal)
            .map_err(|_| failure(input, ErrorKind::Float))?;
        return match literal.parse::<NumberType>() {
            Ok(n) => Ok((rest, Value::Number(n))),
            Err(_) => Err(failure(input, ErrorKind::Float)),
        };
    }

    match token.find(|c: char| !is_symbol_char(c)) {
        None => Ok((rest, Value::Symbol(token.to_owned()))),
        Some(bad) => Err(failure(&input[bad..], ErrorKind::Char)),
    }
}

/// Parse a string literal; everything up to the next `"` is content
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (body, _) = char('"').parse(input)?;
    match body.find('"') {
        Some(end) => Ok((&body[end + 1..], Value::String(body[..end].to_owned()))),
        None => Err(failure(input, ErrorKind::Eof)),
    }
}

/// Parse a bracketed sequence, returning its elements
fn parse_list(
    input: &str,
    open: char,
    close: char,
    depth: usize,
    config: ParseConfig,
) -> IResult<&str, Vec<Value>> {
    let (mut rest, _) = char(open).parse(input)?;
    let mut items = Vec::new();

    loop {
        (rest, _) = skip_trivia(rest, config)?;
        match rest.chars().next() {
            None => return Err(failure(input, ErrorKind::Complete)),
            Some(c) if c == close => return Ok((&rest[c.len_utf8()..], items)),
            Some(')' | ']') => return Err(failure(rest, ErrorKind::Tag)),
            Some(_) => {
                let (after, item) = parse_expr(rest, depth + 1, config).map_err(into_failure)?;
                items.push(item);
                rest = after;
            }
        }
    }
}

fn parse_expr(input: &str, depth: usize, config: ParseConfig) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(failure(input, ErrorKind::TooLarge));
    }
    alt((
        |i| parse_list(i, '(', ')', depth, config).map(|(rest, items)| (rest, Value::SExpr(items))),
        |i| parse_list(i, '[', ']', depth, config).map(|(rest, items)| (rest, Value::QExpr(items))),
        parse_string,
        parse_atom,
    ))
    .parse(input)
}

fn closer_for(open: &str) -> char {
    if open == "[" { ']' } else { ')' }
}

/// Convert nom errors into a structured [`ParseError`]
fn to_syntax_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return Error::SyntaxError(ParseError::new(
                ParseErrorKind::Incomplete,
                "Incomplete input",
                None,
                None,
            ));
        }
    };

    let offset = input.len().saturating_sub(e.input.len());
    let next_char = e.input.chars().next().map(String::from);

    let (kind, message, found) = match e.code {
        ErrorKind::Float => {
            let token = take_while::<_, &str, nom::error::Error<&str>>(is_token_char)
                .parse(e.input)
                .map(|(_, token)| token.to_owned())
                .ok();
            (
                ParseErrorKind::MalformedNumber,
                format!("Malformed number literal at position {offset}"),
                token,
            )
        }
        ErrorKind::Eof => (
            ParseErrorKind::Incomplete,
            format!("Unterminated string literal starting at position {offset}"),
            None,
        ),
        ErrorKind::Complete => {
            let open = next_char.unwrap_or_default();
            (
                ParseErrorKind::Incomplete,
                format!(
                    "Unclosed '{open}' at position {offset} (missing '{}')",
                    closer_for(&open)
                ),
                None,
            )
        }
        ErrorKind::Tag => (
            ParseErrorKind::UnbalancedBracket,
            format!("Mismatched closing bracket at position {offset}"),
            next_char,
        ),
        ErrorKind::TooLarge => (
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            None,
        ),
        _ => (
            ParseErrorKind::InvalidSyntax,
            format!("Unexpected character at position {offset}"),
            next_char,
        ),
    };

    Error::SyntaxError(ParseError::at_offset(kind, message, input, offset, found))
}

/// Read every top-level expression of `input`, with comments enabled.
pub fn parse(input: &str) -> Result<Vec<Value>, Error> {
    parse_with_config(input, ParseConfig::default())
}

/// Read every top-level expression of `input`.
pub fn parse_with_config(input: &str, config: ParseConfig) -> Result<Vec<Value>, Error> {
    let mut forms = Vec::new();
    let mut rest = input;

    loop {
        (rest, _) = skip_trivia(rest, config).map_err(|e| to_syntax_error(input, e))?;
        match rest.chars().next() {
            None => return Ok(forms),
            Some(c @ (')' | ']')) => {
                let offset = input.len() - rest.len();
                return Err(Error::SyntaxError(ParseError::at_offset(
                    ParseErrorKind::UnbalancedBracket,
                    format!("Unexpected closing '{c}' at position {offset}"),
                    input,
                    offset,
                    Some(c.to_string()),
                )));
            }
            Some(_) => {
                let (after, form) =
                    parse_expr(rest, 0, config).map_err(|e| to_syntax_error(input, e))?;
                forms.push(form);
                rest = after;
            }
        }
    }
}
