use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::{Lambda, REST_MARKER, Value, nil};
use crate::builtinops::{OpKind, checked_function, find_builtin_op, get_builtin_ops};
use crate::{Error, MAX_EVAL_DEPTH};

/// Free stack below which evaluation moves to a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each segment allocated by `stacker`
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub(crate) mod intooperation;

use intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
pub use intooperation::{NumIter, StringIter, ValueIter};

/// Argument-count contract of a builtin or special form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => (min..=max).contains(&got),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(*self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Builtin that also sees the caller's environment and evaluation depth
pub type EnvOperationFn = fn(Vec<Value>, &Rc<Environment>, usize) -> Result<Value, Error>;

/// Native implementation behind a [`Value::BuiltinFunction`]
#[derive(Clone)]
pub enum BuiltinFn {
    /// Works on its evaluated arguments only
    Pure(Arc<OperationFn>),
    /// Needs the environment it is called from (`eval`)
    WithEnv(EnvOperationFn),
}

/// One frame of bindings. Frames are shared through `Rc`; the parent link is
/// fixed at construction, and the table itself accepts new bindings through a
/// shared reference so that `def` can write into the global frame while closures
/// hold on to it.
#[derive(Default)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn with_parent(parent: Rc<Environment>) -> Self {
        Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        }
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Look a name up, innermost frame first
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            frame = frame.parent.as_deref()?;
        }
    }

    /// The root of this frame's parent chain
    pub fn global(&self) -> &Environment {
        let mut frame = self;
        while let Some(parent) = frame.parent.as_deref() {
            frame = parent;
        }
        frame
    }

    /// Register a builtin written against raw argument slices.
    ///
    /// This is the low-level API; it is wired through the same machinery as
    /// [`Environment::register_builtin_operation`], which should be preferred
    /// for new code.
    ///
    /// # Example
    /// ```
    /// use bebop::ast::Value;
    /// use bebop::evaluator::create_global_env;
    /// use bebop::Error;
    ///
    /// fn count_args(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Number(args.len() as f64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("count-args", count_args);
    /// // (count-args 1 2 3) now evaluates to 3
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.define(name, pure_builtin(name, wrapped));
    }

    /// Register a strongly-typed Rust function as a builtin, with automatic
    /// argument conversion and result wrapping.
    ///
    /// ```rust,ignore
    /// fn hypot(a: f64, b: f64) -> f64 { (a * a + b * b).sqrt() }
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// ```
    ///
    /// Supported parameter types:
    /// - `f64` (Number)
    /// - `&str` (borrowed String contents)
    /// - `Value` (owned access to the raw argument)
    /// - `ValueIter<'_>`, `NumIter<'_>`, `StringIter<'_>` (elements of a
    ///   Q-expression argument)
    ///
    /// Supported return types are anything `Into<Value>` (`f64`, `bool`, `String`,
    /// `Value`, ...) and `Result<T, Error>` of those. Arity is enforced from the
    /// signature; conversion failures are `TypeError`s.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        self.define(name, pure_builtin(name, func.into_operation()));
    }

    /// Register a builtin whose last parameter collects the remaining arguments
    /// (`ValueIter<'_>`, `NumIter<'_>` or `StringIter<'_>`), optionally after a
    /// fixed prefix. Variadic minimums cannot be read off the Rust signature, so
    /// the [`Arity`] is given explicitly and checked on every call.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        self.define(name, pure_builtin(name, wrapped));
    }

    /// Drop every binding of this frame. Breaks the cycles between the root frame
    /// and the closures bound in it.
    pub(crate) fn clear(&self) {
        self.bindings.borrow_mut().clear();
    }

    /// All bindings visible from this frame, inner ones shadowing outer ones,
    /// sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = match &self.parent {
            Some(parent) => parent.get_all_bindings().into_iter().collect(),
            None => HashMap::new(),
        };
        for (name, value) in self.bindings.borrow().iter() {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

fn pure_builtin(name: &str, func: Arc<OperationFn>) -> Value {
    Value::BuiltinFunction {
        id: name.to_owned(),
        func: BuiltinFn::Pure(func),
    }
}

/// Evaluate an expression (public API)
pub fn eval(expr: &Value, env: &Rc<Environment>) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, 0)
}

fn check_depth(depth: usize) -> Result<(), Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }
    Ok(())
}

/// Evaluate an expression with depth tracking. Every recursive path of the
/// evaluator passes through here or [`eval_promoted`], where the native stack is
/// grown on demand, so only `MAX_EVAL_DEPTH` bounds recursion.
pub(crate) fn eval_with_depth_tracking(
    expr: &Value,
    env: &Rc<Environment>,
    depth: usize,
) -> Result<Value, Error> {
    check_depth(depth)?;
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || eval_value(expr, env, depth))
}

fn eval_value(expr: &Value, env: &Rc<Environment>, depth: usize) -> Result<Value, Error> {
    match expr {
        Value::Number(_)
        | Value::String(_)
        | Value::QExpr(_)
        | Value::BuiltinFunction { .. }
        | Value::Lambda(_) => Ok(expr.clone()),

        Value::Symbol(name) => env
            .get(name)
            .ok_or_else(|| Error::UnboundSymbol(name.clone())),

        Value::SExpr(elements) => {
            eval_sexpr(elements, env, depth).map_err(|err| add_context(err, expr))
        }
    }
}

/// Reduce the contents of a Q-expression as an S-expression (lambda bodies,
/// `if` branches, `eval`)
pub(crate) fn eval_promoted(
    items: &[Value],
    env: &Rc<Environment>,
    depth: usize,
) -> Result<Value, Error> {
    check_depth(depth)?;
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        eval_sexpr(items, env, depth)
            .map_err(|err| add_context(err, &Value::SExpr(items.to_vec())))
    })
}

/// Attach the innermost failing expression to type and evaluation errors
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::EvalError(msg) if !msg.contains("Context:") => {
            Error::EvalError(format!("{msg}\n  Context: while evaluating: {expr}"))
        }
        Error::TypeError(msg) if !msg.contains("Context:") => {
            Error::TypeError(format!("{msg}\n  Context: while evaluating: {expr}"))
        }
        other => other,
    }
}

fn eval_args(args: &[Value], env: &Rc<Environment>, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth + 1))
        .collect()
}

fn eval_sexpr(elements: &[Value], env: &Rc<Environment>, depth: usize) -> Result<Value, Error> {
    if let [Value::Symbol(name), operands @ ..] = elements
        && let Some(op) = find_builtin_op(name)
        && let OpKind::SpecialForm(special_form) = op.op_kind
    {
        op.validate_arity(operands.len())
            .map_err(|err| err.in_operation(op.id))?;
        return special_form(operands, env, depth);
    }

    match elements {
        [] => Ok(nil()),

        // A lone element is its own value; a lone function is called with no
        // arguments, which is how thunks such as `(acc)` are forced.
        [single] => match eval_with_depth_tracking(single, env, depth + 1)? {
            Value::Lambda(lambda) => apply_lambda(&lambda, Vec::new(), depth),
            builtin @ Value::BuiltinFunction { .. } => call_without_arguments(builtin, env, depth),
            value => Ok(value),
        },

        [func_expr, arg_exprs @ ..] => {
            let func = eval_with_depth_tracking(func_expr, env, depth + 1)?;
            let args = eval_args(arg_exprs, env, depth)?;
            apply(&func, args, env, depth)
        }
    }
}

/// `(f)` for a builtin `f`: builtins that take no arguments (`rand`, `list`) run,
/// any other builtin is returned as a value. Builtins check their arity before
/// doing any work, so the failed attempt has no effect.
fn call_without_arguments(
    builtin: Value,
    env: &Rc<Environment>,
    depth: usize,
) -> Result<Value, Error> {
    match apply(&builtin, Vec::new(), env, depth) {
        Err(Error::ArityError { got: 0, .. }) => Ok(builtin),
        result => result,
    }
}

/// Apply a function value to already-evaluated arguments. `env` is the caller's
/// environment, seen only by builtins such as `eval`.
pub(crate) fn apply(
    func: &Value,
    args: Vec<Value>,
    env: &Rc<Environment>,
    depth: usize,
) -> Result<Value, Error> {
    match func {
        Value::BuiltinFunction {
            id,
            func: BuiltinFn::Pure(f),
        } => f(args).map_err(|err| err.in_operation(id)),
        Value::BuiltinFunction {
            func: BuiltinFn::WithEnv(f),
            ..
        } => f(args, env, depth),
        Value::Lambda(lambda) => apply_lambda(lambda, args, depth),
        other => Err(Error::TypeError(format!(
            "Cannot apply non-function: {other}"
        ))),
    }
}

/// Bind arguments to formals in order. Fully applied lambdas run their body in a
/// fresh child of the captured frame; partially applied ones return a new lambda
/// over the remaining formals, capturing a frame with the bindings made so far.
fn apply_lambda(lambda: &Lambda, args: Vec<Value>, depth: usize) -> Result<Value, Error> {
    let given = args.len();
    let frame = Environment::with_parent(Rc::clone(&lambda.env));
    let mut formals = lambda.formals.as_slice();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match formals {
            [] => {
                return Err(Error::arity_error_with_expr(
                    Arity::Exact(lambda.formals.len()),
                    given,
                    format!("\\ [{}]", lambda.formals.join(" ")),
                ));
            }
            [marker, rest_name] if marker == REST_MARKER => {
                let mut rest = vec![arg];
                rest.extend(args.by_ref());
                frame.define(rest_name.clone(), Value::QExpr(rest));
                formals = &[];
            }
            [name, remaining @ ..] => {
                frame.define(name.clone(), arg);
                formals = remaining;
            }
        }
    }

    // Only the rest formal left: it collects nothing
    if let [marker, rest_name] = formals
        && marker == REST_MARKER
    {
        frame.define(rest_name.clone(), nil());
        formals = &[];
    }

    let frame = Rc::new(frame);
    if formals.is_empty() {
        eval_promoted(&lambda.body, &frame, depth + 1)
    } else {
        Ok(Value::Lambda(Rc::new(Lambda {
            formals: formals.to_vec(),
            body: lambda.body.clone(),
            env: frame,
        })))
    }
}

/// Shared shape of `def` and `=`: a Q-expression of names followed by one value
/// per name. Values are evaluated in `env`, bindings land in `target`.
fn bind_names(
    form: &str,
    args: &[Value],
    target: &Environment,
    env: &Rc<Environment>,
    depth: usize,
) -> Result<Value, Error> {
    let [names_expr, value_exprs @ ..] = args else {
        return Err(Error::arity_error_with_expr(
            Arity::AtLeast(2),
            args.len(),
            form.to_owned(),
        ));
    };

    let names = match eval_with_depth_tracking(names_expr, env, depth + 1)? {
        Value::QExpr(items) => items,
        other => {
            return Err(Error::TypeError(format!(
                "{form}: expected a Q-Expression of symbols, got {}",
                other.type_name()
            )));
        }
    };
    let names = names
        .into_iter()
        .map(|name| match name {
            Value::Symbol(s) => Ok(s),
            other => Err(Error::TypeError(format!(
                "{form}: cannot define non-symbol {other}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if names.len() != value_exprs.len() {
        return Err(Error::arity_error_with_expr(
            Arity::Exact(names.len() + 1),
            args.len(),
            form.to_owned(),
        ));
    }

    let values = eval_args(value_exprs, env, depth)?;
    for (name, value) in names.into_iter().zip(values) {
        trace!(form, name = %name, "binding");
        target.define(name, value);
    }
    Ok(nil())
}

/// `def`: bind in the global frame of the current chain
pub(crate) fn eval_def(args: &[Value], env: &Rc<Environment>, depth: usize) -> Result<Value, Error> {
    bind_names("def", args, env.global(), env, depth)
}

/// `=`: bind in the current frame
pub(crate) fn eval_put(args: &[Value], env: &Rc<Environment>, depth: usize) -> Result<Value, Error> {
    bind_names("=", args, env, env, depth)
}

/// `\`: build a lambda over the current environment
pub(crate) fn eval_lambda(
    args: &[Value],
    env: &Rc<Environment>,
    depth: usize,
) -> Result<Value, Error> {
    let [formals_expr, body_expr] = args else {
        return Err(Error::arity_error_with_expr(
            Arity::Exact(2),
            args.len(),
            "\\".to_owned(),
        ));
    };

    let formals = match eval_with_depth_tracking(formals_expr, env, depth + 1)? {
        Value::QExpr(items) => items,
        other => {
            return Err(Error::TypeError(format!(
                "\\: formals must be a Q-Expression, got {}",
                other.type_name()
            )));
        }
    };
    let body = match eval_with_depth_tracking(body_expr, env, depth + 1)? {
        Value::QExpr(items) => items,
        other => {
            return Err(Error::TypeError(format!(
                "\\: body must be a Q-Expression, got {}",
                other.type_name()
            )));
        }
    };

    let mut names: Vec<String> = Vec::with_capacity(formals.len());
    for formal in formals {
        match formal {
            Value::Symbol(name) => {
                if names.contains(&name) {
                    return Err(Error::EvalError(format!(
                        "Duplicate parameter name: {name}"
                    )));
                }
                names.push(name);
            }
            other => {
                return Err(Error::TypeError(format!(
                    "\\: formals must be symbols, got {other}"
                )));
            }
        }
    }

    if let Some(pos) = names.iter().position(|name| name == REST_MARKER)
        && pos + 2 != names.len()
    {
        return Err(Error::TypeError(format!(
            "\\: '{REST_MARKER}' must be followed by exactly one formal"
        )));
    }

    Ok(Value::Lambda(Rc::new(Lambda {
        formals: names,
        body,
        env: Rc::clone(env),
    })))
}

/// `if`: a Number condition picks one of two Q-expression branches; only that
/// branch is evaluated
pub(crate) fn eval_if(args: &[Value], env: &Rc<Environment>, depth: usize) -> Result<Value, Error> {
    let [condition_expr, then_expr, else_expr] = args else {
        return Err(Error::arity_error_with_expr(
            Arity::Exact(3),
            args.len(),
            "if".to_owned(),
        ));
    };

    let branch = match eval_with_depth_tracking(condition_expr, env, depth + 1)? {
        Value::Number(n) if n != 0.0 => then_expr,
        Value::Number(_) => else_expr,
        other => {
            return Err(Error::TypeError(format!(
                "if: condition must be a Number, got {}",
                other.type_name()
            )));
        }
    };

    match eval_with_depth_tracking(branch, env, depth + 1)? {
        Value::QExpr(items) => eval_promoted(&items, env, depth + 1),
        other => Err(Error::TypeError(format!(
            "if: branches must be Q-Expressions, got {}",
            other.type_name()
        ))),
    }
}

/// Create a global environment holding every primitive
pub fn create_global_env() -> Rc<Environment> {
    let env = Environment::new();

    for builtin_op in get_builtin_ops() {
        let func = match &builtin_op.op_kind {
            OpKind::Function(_) => match checked_function(builtin_op) {
                Some(f) => BuiltinFn::Pure(f),
                None => continue,
            },
            OpKind::WithEnv(f) => BuiltinFn::WithEnv(*f),
            OpKind::SpecialForm(_) => continue,
        };
        env.define(
            builtin_op.id,
            Value::BuiltinFunction {
                id: builtin_op.id.to_owned(),
                func,
            },
        );
    }

    debug!(
        primitives = env.bindings.borrow().len(),
        "global environment created"
    );
    Rc::new(env)
}
