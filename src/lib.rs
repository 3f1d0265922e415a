//! Bebop - evaluation engine for a small document-preprocessing Lisp
//!
//! Markdown documents are compiled by an outer layer into calls against this engine;
//! the value of every top-level form is rendered to text and concatenated into the
//! final document. This crate holds the engine itself: the reader, the value model,
//! environments and closures, the evaluator, the primitive library and the bootstrap
//! sequence that loads the standard-library prelude.
//!
//! ## The language
//!
//! ```text
//! (+ 1 2 3)                        ; application: 6
//! [1 2 3]                          ; Q-expression: data, evaluates to itself
//! (def [x] 10)                     ; global binding
//! (\ [a b] [+ a b])                ; lambda: formals and body are Q-expressions
//! ((\ [a b] [+ a b]) 3)            ; partial application returns a lambda
//! (if (== x 10) [echo x] [0])      ; branches are Q-expressions, only one runs
//! (fun [square n] [* n n])         ; prelude helper for global functions
//! ```
//!
//! Numbers are `f64`. The empty Q-expression `[]` is nil. Any non-zero number is true.
//! There is no mutation beyond `def` and `=`, and no tail-call optimization.
//!
//! ## Modules
//!
//! - `reader`: text to [`ast::Value`] trees
//! - `ast`: the value model
//! - `evaluator`: environments, special forms, application and currying
//! - `builtinops`: the primitive library
//! - `engine`: bootstrap, the prelude and the document interface

use std::fmt;

use crate::evaluator::Arity;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth. Recursion is the only looping construct of the
/// language, so this turns runaway recursion into an [`Error::EvalError`]. The
/// evaluator grows the native stack on demand, so the bound holds on any thread.
/// A `rec-list` step costs about five levels, which leaves room for lists of a
/// couple of thousand elements.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Treat `;` outside of strings as the start of a line comment
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Character that cannot start or continue a token
    InvalidSyntax,
    /// Input ended inside a string or an open bracket
    Incomplete,
    /// Token that starts like a number but is not one (e.g. `12abc`, `1.2.3`)
    MalformedNumber,
    /// Closing bracket with no opener, or of the wrong shape
    UnbalancedBracket,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Excerpt of the input around the failure (max 60 chars)
    pub context: Option<String>,
    /// The offending token or character, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Build a ParseError whose context is cut from `input` around byte `error_offset`
    pub fn at_offset(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 60;

        let start_char = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count()
            .saturating_sub(20);
        let excerpt: String = input.chars().skip(start_char).take(MAX_CONTEXT).collect();

        let mut context = String::new();
        if start_char > 0 {
            context.push_str("[...]");
        }
        context.push_str(&excerpt);
        if start_char + excerpt.chars().count() < input.chars().count() {
            context.push_str("[...]");
        }
        let context = context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(context), found)
    }
}

/// Every failure the engine can report
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The reader rejected the input
    SyntaxError(ParseError),
    /// Lookup of a name bound in no enclosing frame
    UnboundSymbol(String),
    /// Operand of the wrong kind, or application of a non-function
    TypeError(String),
    ArityError {
        expected: Arity,
        got: usize,
        /// Name of the function or form that was called, when known
        expression: Option<String>,
    },
    /// `head`/`tail` of the empty list; carries the primitive name
    EmptyListAccess(String),
    /// Zero right operand to `/` or `%`; carries the primitive name
    DivisionByZero(String),
    /// Resource limits, malformed definitions and author-raised errors (`die`)
    EvalError(String),
}

impl Error {
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// Attach the name of the failing builtin, unless the error already names one
    pub(crate) fn in_operation(self, name: &str) -> Self {
        match self {
            Error::TypeError(msg) => Error::TypeError(format!("{name}: {msg}")),
            Error::ArityError {
                expected,
                got,
                expression: None,
            } => Error::arity_error_with_expr(expected, got, name.to_owned()),
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                write!(f, "SyntaxError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundSymbol(name) => write!(f, "Unbound symbol: {name}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(f, "ArityError: expected {expected} arguments, got {got}"),
            },
            Error::EmptyListAccess(name) => write!(f, "EmptyListAccess: {name} of empty list"),
            Error::DivisionByZero(name) => write!(f, "DivisionByZero: {name} by zero"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod engine;
pub mod evaluator;
pub mod reader;

pub use engine::{DocumentError, Engine, EngineConfig};
