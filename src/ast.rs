//! This module defines the value model shared by the reader, the evaluator and the
//! primitives. [`Value`] is a closed union: numbers, strings, symbols, the two list
//! shapes (S-expressions, which are code, and Q-expressions, which are data) and the
//! two kinds of function. Ergonomic helpers such as [`val`], [`sym`] and [`nil`] build
//! trees in code and tests, and conversion traits turn Rust literals, arrays and
//! vectors into Values. Equality is structural; display output re-reads to an equal
//! value for everything built from plain data.

use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::evaluator::{BuiltinFn, Environment};

/// Type alias for number values in the interpreter
pub(crate) type NumberType = f64;

/// Non-alphanumeric characters allowed in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "_+\\:-*/=|!&%<>";

/// Formal that makes the following formal collect all remaining arguments
pub(crate) const REST_MARKER: &str = ":";

/// Core value type of the interpreter
///
/// To build a tree, use the helper functions:
/// - `val(42)` for numbers, `val("text")` for strings, `sym("name")` for symbols
/// - `val([1, 2, 3])` or `val(vec![sym("x"), val(1)])` for Q-expressions
/// - `sexpr(vec![sym("+"), val(1), val(2)])` for S-expressions
/// - `nil()` for the empty Q-expression
#[derive(Clone)]
pub enum Value {
    Number(NumberType),
    /// Literal text
    String(String),
    /// Identifier, evaluated by environment lookup
    Symbol(String),
    /// `( ... )`: evaluated as a call or special form
    SExpr(Vec<Value>),
    /// `[ ... ]`: data, evaluates to itself; empty is nil
    QExpr(Vec<Value>),
    /// Native function, identified by its name for equality and display
    BuiltinFunction { id: String, func: BuiltinFn },
    /// User function created by `\`
    Lambda(Rc<Lambda>),
}

/// A closure: formals still waiting for arguments, the body and the captured frame
pub struct Lambda {
    pub(crate) formals: Vec<String>,
    pub(crate) body: Vec<Value>,
    pub(crate) env: Rc<Environment>,
}

impl Lambda {
    pub fn formals(&self) -> &[String] {
        &self.formals
    }

    pub fn body(&self) -> &[Value] {
        &self.body
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::SExpr(items) => write_debug_items(f, "SExpr", items),
            Value::QExpr(items) => write_debug_items(f, "QExpr", items),
            Value::BuiltinFunction { id, .. } => write!(f, "BuiltinFunction({id})"),
            Value::Lambda(lambda) => write!(
                f,
                "Lambda(formals={:?}, body={:?})",
                lambda.formals, lambda.body
            ),
        }
    }
}

fn write_debug_items(f: &mut fmt::Formatter<'_>, tag: &str, items: &[Value]) -> fmt::Result {
    write!(f, "{tag}(")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v:?}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::SExpr(items) => write_items(f, '(', items, ')'),
            Value::QExpr(items) => write_items(f, '[', items, ']'),
            Value::BuiltinFunction { id, .. } => write!(f, "<builtin:{id}>"),
            Value::Lambda(lambda) => {
                write!(f, "(\\ [{}] ", lambda.formals.join(" "))?;
                write_items(f, '[', &lambda.body, ']')?;
                write!(f, ")")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, open: char, items: &[Value], close: char) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

impl Value {
    /// Check if a value is nil (the empty Q-expression)
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::QExpr(items) if items.is_empty())
    }

    /// Kind name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::SExpr(_) => "S-Expression",
            Value::QExpr(_) => "Q-Expression",
            Value::BuiltinFunction { .. } | Value::Lambda(_) => "Function",
        }
    }

    /// Text this value contributes to a rendered document.
    ///
    /// Strings contribute their raw content and nil contributes nothing, so that
    /// definitions leave no trace in the output. Everything else renders in its
    /// display form.
    pub fn to_document_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            v if v.is_nil() => String::new(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::SExpr(a), Value::SExpr(b)) => a == b,
            (Value::QExpr(a), Value::QExpr(b)) => a == b,
            // Builtins compare by id, not by function pointer
            (Value::BuiltinFunction { id: id1, .. }, Value::BuiltinFunction { id: id2, .. }) => {
                id1 == id2
            }
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Booleans are numbers in this language: 1 for true, 0 for false
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

macro_rules! impl_from_number {
    ($num_type:ty) => {
        impl From<$num_type> for Value {
            fn from(n: $num_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_number!(i8);
impl_from_number!(i16);
impl_from_number!(i32);
impl_from_number!(u8);
impl_from_number!(u16);
impl_from_number!(u32);
impl_from_number!(f32);
impl_from_number!(NumberType);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::QExpr(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::QExpr(arr.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(n)
        } else {
            Err(Error::TypeError(format!(
                "expected Number, got {}",
                value.type_name()
            )))
        }
    }
}

/// Helper for creating symbols - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for creating Values from anything convertible
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper for creating S-expressions (code) from mixed elements
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sexpr(items: Vec<Value>) -> Value {
    Value::SExpr(items)
}

/// The empty Q-expression, which doubles as nil and as the result of definitions
pub(crate) fn nil() -> Value {
    Value::QExpr(vec![])
}
