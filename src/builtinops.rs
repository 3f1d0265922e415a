//! Registry of built-in operations.
//!
//! Every primitive of the language and every special form is described once here,
//! with its identifier and arity. The evaluator binds the functions into the root
//! environment at bootstrap and dispatches special forms by head symbol.
//!
//! ```text
//! (+ 1 2 3)              ; 6
//! (head [1 2 3])         ; [1]
//! (join [1] [2 3])       ; [1 2 3]
//! (join "a" "b")         ; "ab"
//! (== [1 2] (list 1 2))  ; 1
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** receive evaluated arguments (`+`, `head`, `join`, ...). `eval` is a
//!   function too, but one that also sees the caller's environment.
//! - **Special forms** (`def`, `=`, `\`, `if`) receive their operands unevaluated and
//!   are never bound as values.
//!
//! ## Typing
//!
//! There is no coercion: arithmetic and comparisons take Numbers, `join` takes either
//! all Q-expressions or all Strings. Booleans are the Numbers `1` and `0`, and any
//! non-zero Number counts as true for `&&`, `||` and `!`.
//!
//! ## Adding New Operations
//!
//! 1. Write the function with typed parameters (`f64`, `&str`, `Value`, `ValueIter`,
//!    `NumIter`, `StringIter`); the adapter layer handles conversion
//! 2. Add a `BuiltinOp` entry to `BUILTIN_OPS` with its identifier and arity
//! 3. Add cases to the table in the tests below

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::evaluator::{
    Arity, EnvOperationFn, Environment, NumIter, ValueIter, eval_def, eval_if, eval_lambda,
    eval_promoted, eval_put, eval_with_depth_tracking,
};
use rand::Rng;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

/// Signature of a special form: unevaluated operands, the environment being
/// evaluated against and the current evaluation depth
pub type SpecialFormFn = fn(&[Value], &Rc<Environment>, usize) -> Result<Value, Error>;

/// Represents the implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Function over evaluated arguments, in the erased form produced by the
    /// adapter layer
    Function(Arc<OperationFn>),
    /// Function over evaluated arguments that also needs the caller's environment
    WithEnv(EnvOperationFn),
    /// Special form
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::WithEnv(_) => write!(f, "WithEnv(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// Name the operation is bound to (functions) or dispatched by (special forms)
    pub id: &'static str,
    pub op_kind: OpKind,
    /// Expected number of arguments, checked on every call
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    #[cfg_attr(not(test), expect(dead_code))]
    pub(crate) fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count)
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc + n)
}

fn builtin_sub(first: NumberType, rest: NumIter<'_>) -> NumberType {
    if rest.len() == 0 {
        return -first;
    }
    rest.fold(first, |acc, n| acc - n)
}

fn builtin_mul(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc * n)
}

fn builtin_div(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0.0 {
        return Err(Error::DivisionByZero("/".to_owned()));
    }
    Ok(a / b)
}

fn builtin_rem(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0.0 {
        return Err(Error::DivisionByZero("%".to_owned()));
    }
    Ok(a % b)
}

fn builtin_equal(first: Value, second: Value) -> bool {
    first == second
}

fn builtin_not_equal(first: Value, second: Value) -> bool {
    first != second
}

macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> bool {
            a $op b
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

fn is_truthy(n: NumberType) -> bool {
    n != 0.0
}

fn builtin_and(a: NumberType, b: NumberType) -> bool {
    is_truthy(a) && is_truthy(b)
}

fn builtin_or(a: NumberType, b: NumberType) -> bool {
    is_truthy(a) || is_truthy(b)
}

fn builtin_not(n: NumberType) -> bool {
    !is_truthy(n)
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::QExpr(args.cloned().collect())
}

fn builtin_head(mut list: ValueIter<'_>) -> Result<Value, Error> {
    match list.next() {
        Some(first) => Ok(Value::QExpr(vec![first.clone()])),
        None => Err(Error::EmptyListAccess("head".to_owned())),
    }
}

fn builtin_tail(mut list: ValueIter<'_>) -> Result<Value, Error> {
    let Some(_) = list.next() else {
        return Err(Error::EmptyListAccess("tail".to_owned()));
    };
    Ok(Value::QExpr(list.cloned().collect()))
}

fn cannot_join(first: &Value, other: &Value) -> Error {
    Error::TypeError(format!(
        "cannot join {} with {}",
        first.type_name(),
        other.type_name()
    ))
}

fn builtin_join(first: Value, rest: ValueIter<'_>) -> Result<Value, Error> {
    match first {
        Value::QExpr(mut items) => {
            for arg in rest {
                match arg {
                    Value::QExpr(more) => items.extend(more.iter().cloned()),
                    other => return Err(cannot_join(&Value::QExpr(items), other)),
                }
            }
            Ok(Value::QExpr(items))
        }
        Value::String(mut text) => {
            for arg in rest {
                match arg {
                    Value::String(more) => text.push_str(more),
                    other => return Err(cannot_join(&Value::String(text), other)),
                }
            }
            Ok(Value::String(text))
        }
        other => Err(Error::TypeError(format!(
            "expected Q-Expressions or Strings, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_concat(first: Value, rest: ValueIter<'_>) -> Result<Value, Error> {
    if rest.len() == 0 {
        return Ok(first);
    }
    builtin_join(first, rest)
}

fn builtin_eval(args: Vec<Value>, env: &Rc<Environment>, depth: usize) -> Result<Value, Error> {
    let [expr] = args.as_slice() else {
        return Err(Error::arity_error_with_expr(
            Arity::Exact(1),
            args.len(),
            "eval".to_owned(),
        ));
    };
    match expr {
        Value::QExpr(items) => eval_promoted(items, env, depth + 1),
        other => eval_with_depth_tracking(other, env, depth + 1),
    }
}

fn builtin_echo(value: Value) -> String {
    value.to_string()
}

fn builtin_do(first: Value, mut rest: ValueIter<'_>) -> Value {
    match rest.next_back() {
        Some(last) => last.clone(),
        None => first,
    }
}

fn builtin_die(message: &str) -> Result<Value, Error> {
    Err(Error::EvalError(message.to_owned()))
}

/// Upper bound (exclusive) of `rand`, which yields a whole number
const RAND_RANGE: u32 = 1_000_000_000;

fn builtin_rand() -> NumberType {
    NumberType::from(rand::thread_rng().gen_range(0..RAND_RANGE))
}

/// Global registry of all built-in operations, built once through the same
/// adapter layer used for host registration
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    vec![
        // Arithmetic
        BuiltinOp {
            id: "+",
            op_kind: OpKind::Function(builtin_variadic::<(NumberType, NumIter<'static>), _>(
                builtin_add,
            )),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "-",
            op_kind: OpKind::Function(builtin_variadic::<(NumberType, NumIter<'static>), _>(
                builtin_sub,
            )),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "*",
            op_kind: OpKind::Function(builtin_variadic::<(NumberType, NumIter<'static>), _>(
                builtin_mul,
            )),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "/",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_div)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "%",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_rem)),
            arity: Arity::Exact(2),
        },
        // Equality and comparison
        BuiltinOp {
            id: "==",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_equal)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "!=",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_not_equal)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_lt)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_gt)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<=",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_le)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">=",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_ge)),
            arity: Arity::Exact(2),
        },
        // Logic
        BuiltinOp {
            id: "&&",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_and)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "||",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType, NumberType), _>(builtin_or)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "!",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType,), _>(builtin_not)),
            arity: Arity::Exact(1),
        },
        // Lists and strings
        BuiltinOp {
            id: "list",
            op_kind: OpKind::Function(builtin_variadic::<(ValueIter<'static>,), _>(builtin_list)),
            arity: Arity::Any,
        },
        BuiltinOp {
            id: "head",
            op_kind: OpKind::Function(builtin_fixed::<(ValueIter<'static>,), _>(builtin_head)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "tail",
            op_kind: OpKind::Function(builtin_fixed::<(ValueIter<'static>,), _>(builtin_tail)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "join",
            op_kind: OpKind::Function(builtin_variadic::<(Value, ValueIter<'static>), _>(
                builtin_join,
            )),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "concat",
            op_kind: OpKind::Function(builtin_variadic::<(Value, ValueIter<'static>), _>(
                builtin_concat,
            )),
            arity: Arity::AtLeast(1),
        },
        // Evaluation and output
        BuiltinOp {
            id: "eval",
            op_kind: OpKind::WithEnv(builtin_eval),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "echo",
            op_kind: OpKind::Function(builtin_fixed::<(Value,), _>(builtin_echo)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "do",
            op_kind: OpKind::Function(builtin_variadic::<(Value, ValueIter<'static>), _>(
                builtin_do,
            )),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "die",
            op_kind: OpKind::Function(builtin_fixed::<(&str,), _>(builtin_die)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "rand",
            op_kind: OpKind::Function(builtin_fixed::<(), _>(builtin_rand)),
            arity: Arity::Exact(0),
        },
        // Special forms
        BuiltinOp {
            id: "def",
            op_kind: OpKind::SpecialForm(eval_def),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "=",
            op_kind: OpKind::SpecialForm(eval_put),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "\\",
            op_kind: OpKind::SpecialForm(eval_lambda),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            arity: Arity::Exact(3),
        },
    ]
});

static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by identifier
pub(crate) fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Erased function for a registry entry, checking the entry's arity before the
/// adapter runs
pub(crate) fn checked_function(op: &BuiltinOp) -> Option<Arc<OperationFn>> {
    let OpKind::Function(func) = &op.op_kind else {
        return None;
    };
    let func = Arc::clone(func);
    let arity = op.arity;
    Some(Arc::new(move |args: Vec<Value>| {
        arity.validate(args.len())?;
        func(args)
    }))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sexpr, sym, val};

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a function builtin through the registry, arity check included
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin_op(name).unwrap();
        let func = checked_function(op)
            .unwrap_or_else(|| panic!("expected function builtin in tests: {name}"));
        func(args.to_vec())
    }

    #[test]
    fn test_builtin_ops_registry() {
        let not_op = find_builtin_op("!").unwrap();
        assert_eq!(not_op.arity, Arity::Exact(1));
        assert!(!not_op.is_special_form());

        let add_op = find_builtin_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::AtLeast(1));
        if let OpKind::Function(func) = &add_op.op_kind {
            assert_eq!(func(vec![val(1), val(2)]).unwrap(), val(3));
        } else {
            panic!("Expected Function variant");
        }

        for (id, arity) in [
            ("def", Arity::AtLeast(2)),
            ("=", Arity::AtLeast(2)),
            ("\\", Arity::Exact(2)),
            ("if", Arity::Exact(3)),
        ] {
            let op = find_builtin_op(id).unwrap();
            assert!(op.is_special_form(), "{id} should be a special form");
            assert_eq!(op.arity, arity);
            op.validate_arity(3).unwrap_or_else(|_| assert_eq!(id, "\\"));
        }

        assert!(matches!(
            find_builtin_op("eval").unwrap().op_kind,
            OpKind::WithEnv(_)
        ));

        let all_ops = get_builtin_ops();
        assert_eq!(all_ops.len(), BUILTIN_BY_ID.len(), "identifiers must be unique");
        assert!(checked_function(find_builtin_op("if").unwrap()).is_none());
        assert!(find_builtin_op("unknown").is_none());
        assert!(find_builtin_op("fun").is_none()); // prelude, not a primitive
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();
        let nested = val([val([val([1])])]);
        let mixed = val(vec![val(1), val("hello"), sym("x"), nil()]);
        let code = val(vec![sym("+"), val(1), val(2)]);

        let test_cases: Vec<TestCase> = vec![
            // =================================================================
            // ARITHMETIC
            // =================================================================
            test!("+", &[val(1), val(2), val(3)], success(6)),
            test!("+", &[val(5)], success(5)),
            test!("+", &[val(0.5), val(0.25)], success(0.75)),
            test!("+", &many_ones, success(100)),
            test!("+", &[], None),
            test!("+", &[val(1), val("2")], None),
            test!("-", &[val(10), val(4), val(3)], success(3)),
            test!("-", &[val(5)], success(-5)),
            test!("-", &[val(-5)], success(5)),
            test!("-", &[], None),
            test!("*", &[val(2), val(3), val(4)], success(24)),
            test!("*", &[val(7)], success(7)),
            test!("*", &[val(2), nil()], None),
            test!("/", &[val(10), val(4)], success(2.5)),
            test!("/", &[val(-9), val(3)], success(-3)),
            test!("/", &[val(1), val(0)], None),
            test!("/", &[val(1), val(2), val(3)], None),
            test!("%", &[val(10), val(3)], success(1)),
            test!("%", &[val(12), val(6)], success(0)),
            test!("%", &[val(1), val(0)], None),
            // =================================================================
            // EQUALITY AND COMPARISON
            // =================================================================
            test!("==", &[val(1), val(1)], success(true)),
            test!("==", &[val(1), val(2)], success(false)),
            test!("==", &[val("a"), val("a")], success(true)),
            test!("==", &[val(1), val("1")], success(false)), // different kinds never equal
            test!("==", &[val([1, 2]), val([1, 2])], success(true)),
            test!("==", &[val([1, 2]), val([2, 1])], success(false)),
            test!("==", &[nil(), nil()], success(true)),
            test!("==", &[nested.clone(), nested.clone()], success(true)),
            test!("==", &[sym("a"), sym("a")], success(true)),
            test!("==", &[val(1)], None),
            test!("!=", &[val(1), val(2)], success(true)),
            test!("!=", &[val([1]), val([1])], success(false)),
            test!("<", &[val(1), val(2)], success(true)),
            test!("<", &[val(2), val(2)], success(false)),
            test!(">", &[val(3), val(2)], success(true)),
            test!("<=", &[val(2), val(2)], success(true)),
            test!(">=", &[val(1), val(2)], success(false)),
            test!("<", &[val("a"), val("b")], None),
            test!("<", &[val(1), val(2), val(3)], None),
            // =================================================================
            // LOGIC
            // =================================================================
            test!("&&", &[val(1), val(1)], success(true)),
            test!("&&", &[val(1), val(0)], success(false)),
            test!("&&", &[val(-2), val(0.5)], success(true)),
            test!("||", &[val(0), val(0)], success(false)),
            test!("||", &[val(0), val(3)], success(true)),
            test!("!", &[val(0)], success(true)),
            test!("!", &[val(7)], success(false)),
            test!("!", &[val("")], None),
            test!("&&", &[val(1), nil()], None),
            // =================================================================
            // LISTS
            // =================================================================
            test!("list", &[], Some(nil())),
            test!("list", &[val(1), val("two"), sym("three")], success(vec![
                val(1),
                val("two"),
                sym("three")
            ])),
            test!("list", &[nil()], success(vec![nil()])),
            test!("head", &[val([1, 2, 3])], success([1])),
            test!("head", &[nested.clone()], success(vec![val([val([1])])])),
            test!("head", &[mixed.clone()], success([1])),
            test!("head", &[nil()], None),
            test!("head", &[val(1)], None),
            test!("head", &[val([1]), val([2])], None),
            test!("tail", &[val([1, 2, 3])], success([2, 3])),
            test!("tail", &[val([1])], Some(nil())),
            test!("tail", &[nil()], None),
            test!("tail", &[val("abc")], None),
            test!("join", &[val([1]), val([2, 3])], success([1, 2, 3])),
            test!("join", &[nil(), nil(), val([1])], success([1])),
            test!("join", &[val("ab"), val("c"), val("")], success("abc")),
            test!("join", &[val([1]), val("a")], None),
            test!("join", &[val("a"), val([1])], None),
            test!("join", &[val(1), val(2)], None),
            test!("join", &[val([1])], None),
            test!("concat", &[val("only")], success("only")),
            test!("concat", &[val(5)], success(5)), // single argument is returned as-is
            test!("concat", &[val("<p>"), val("x"), val("</p>")], success("<p>x</p>")),
            test!("concat", &[val([1]), val([2])], success([1, 2])),
            test!("concat", &[], None),
            // =================================================================
            // OUTPUT AND SEQUENCING
            // =================================================================
            test!("echo", &[val(42)], success("42")),
            test!("echo", &[val("s")], success("\"s\"")),
            test!("echo", &[mixed.clone()], success("[1 \"hello\" x []]")),
            test!("echo", &[code.clone()], success("[+ 1 2]")),
            test!("echo", &[sexpr(vec![sym("f")])], success("(f)")),
            test!("do", &[val(1), val(2), val(3)], success(3)),
            test!("do", &[val("x")], success("x")),
            test!("do", &[], None),
            test!("die", &[val("boom")], None),
            test!("die", &[val(1)], None),
            test!("rand", &[val(1)], None),
        ];

        for (i, (name, actual, expected)) in test_cases.into_iter().enumerate() {
            match (&actual, &expected) {
                (Ok(actual_val), Some(expected_val)) => {
                    assert_eq!(actual_val, expected_val, "Test case #{} ({name})", i + 1);
                }
                (Err(_), None) => {}
                _ => panic!(
                    "Test case #{} ({name}): expected {expected:?}, got {actual:?}",
                    i + 1
                ),
            }
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            call_builtin("head", &[nil()]).unwrap_err(),
            Error::EmptyListAccess("head".to_owned())
        );
        assert_eq!(
            call_builtin("tail", &[nil()]).unwrap_err(),
            Error::EmptyListAccess("tail".to_owned())
        );
        assert_eq!(
            call_builtin("/", &[val(1), val(0)]).unwrap_err(),
            Error::DivisionByZero("/".to_owned())
        );
        assert_eq!(
            call_builtin("%", &[val(1), val(0)]).unwrap_err(),
            Error::DivisionByZero("%".to_owned())
        );
        assert_eq!(
            call_builtin("die", &[val("Custom failure")]).unwrap_err(),
            Error::EvalError("Custom failure".to_owned())
        );
        assert_eq!(
            call_builtin("join", &[val([1]), val("a")]).unwrap_err(),
            Error::TypeError("cannot join Q-Expression with String".to_owned())
        );
        assert_eq!(
            call_builtin("join", &[val([1])]).unwrap_err(),
            Error::arity_error(Arity::AtLeast(2), 1)
        );
        assert_eq!(
            call_builtin("head", &[val(3)]).unwrap_err(),
            Error::TypeError("expected Q-Expression, got Number".to_owned())
        );
    }

    #[test]
    fn test_rand_yields_whole_numbers_in_range() {
        assert_eq!(find_builtin_op("rand").unwrap().arity, Arity::Exact(0));
        for _ in 0..20 {
            match call_builtin("rand", &[]).unwrap() {
                Value::Number(n) => {
                    assert!((0.0..f64::from(RAND_RANGE)).contains(&n), "{n} out of range");
                    assert_eq!(n.fract(), 0.0);
                }
                other => panic!("expected Number, got {other:?}"),
            }
        }
        assert_eq!(
            call_builtin("rand", &[val(1)]).unwrap_err(),
            Error::arity_error(Arity::Exact(0), 1)
        );
    }
}
