use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use crate::ast::{Lambda, Value};
use crate::builtinops::{Arity, OpKind, find_special_form, get_builtin_ops};
use crate::{Error, ParseErrorKind};

pub mod environment;
pub mod intooperation;

pub use environment::Environment;
use intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};

impl Environment {
    /// Register a native procedure that works on the raw argument slice.
    ///
    /// # Example
    /// ```
    /// use minilisp::evaluator::create_global_env;
    /// use minilisp::ast::Value;
    /// use minilisp::Error;
    ///
    /// fn first_or_nil(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(args.first().cloned().unwrap_or(Value::Nil))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("first-or-nil", first_or_nil);
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.bind_native(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a native procedure.
    ///
    /// Parameters may be `f64` or [`Value`]; the return type is
    /// `Result<R, Error>` for any `R: Into<Value>` (numbers, `bool`, `Value`).
    /// The argument count is checked against the function's own arity.
    ///
    /// ```
    /// use minilisp::evaluator::create_global_env;
    /// use minilisp::Error;
    ///
    /// fn hypot(a: f64, b: f64) -> Result<f64, Error> {
    ///     Ok((a * a + b * b).sqrt())
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// ```
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        self.bind_native(name, func.into_operation());
    }

    /// Register a native procedure whose last parameter is a rest iterator
    /// (`NumIter<'_>` or `ValueIter<'_>`), optionally after one fixed parameter.
    ///
    /// The total argument count is validated against `arity` before the
    /// function runs.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        self.bind_native(name, wrapped);
    }

    fn bind_native(&self, name: &str, func: Arc<OperationFn>) {
        self.define(
            name,
            Value::NativeProcedure {
                id: name.to_owned(),
                func,
            },
        );
    }
}

/// Evaluate an expression in an environment.
///
/// Symbols are looked up, numbers, `()` and procedures evaluate to
/// themselves, and a pair is either a special form (when its head is one of
/// the reserved symbols) or a procedure application.
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    match expr {
        Value::Symbol(name) => env.lookup(name),

        Value::Number(_) | Value::Nil | Value::NativeProcedure { .. } | Value::Closure(_) => {
            Ok(expr.clone())
        }

        Value::Pair(cell) => {
            let operands = form_operands(&cell.tail)?;

            if let Value::Symbol(name) = &cell.head
                && let Some(op) = find_special_form(name)
                && let OpKind::SpecialForm(special_form) = op.op_kind
            {
                op.arity
                    .validate(operands.len())
                    .map_err(|err| with_expression(err, expr))?;
                return special_form(&operands, env);
            }

            eval_application(&cell.head, &operands, env).map_err(|err| add_context(err, expr))
        }
    }
}

/// Collect the operands of a form, rejecting improper lists.
fn form_operands(tail: &Value) -> Result<Vec<Value>, Error> {
    tail.to_vec().ok_or_else(|| {
        Error::syntax(
            ParseErrorKind::InvalidForm,
            format!("improper list in form: {tail}"),
        )
    })
}

fn with_expression(error: Error, expr: &Value) -> Error {
    match error {
        Error::ArityError {
            expected,
            got,
            expression: None,
        } => Error::arity_error_with_expr(expected, got, expr.to_string()),
        other => other,
    }
}

/// Attach the innermost failing expression to a type error
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::TypeError(msg) if !msg.contains("\n  Context:") => {
            Error::TypeError(format!("{msg}\n  Context: while evaluating: {expr}"))
        }
        other => other,
    }
}

fn eval_application(head: &Value, operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let func = eval(head, env)?;
    let args = operands
        .iter()
        .map(|arg| eval(arg, env))
        .collect::<Result<Vec<_>, _>>()?;
    apply(&func, args)
}

/// Apply an already-evaluated procedure to already-evaluated arguments
pub fn apply(func: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::NativeProcedure { id, func } => {
            trace!(procedure = %id, argc = args.len(), "apply native procedure");
            func(args)
        }
        Value::Closure(lambda) => {
            trace!(params = ?lambda.params, argc = args.len(), "apply closure");
            let frame = lambda.env.extend(&lambda.params, args)?;
            eval(&lambda.body, &frame)
        }
        other => Err(Error::TypeError(format!(
            "not callable: {} {other}",
            other.type_name()
        ))),
    }
}

/// `(quote datum)`
pub(crate) fn eval_quote(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [datum] => Ok(datum.clone()),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

/// `(if test consequent alternate)`; only the chosen branch is evaluated
pub(crate) fn eval_if(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [test, consequent, alternate] => {
            if eval(test, env)?.is_truthy() {
                eval(consequent, env)
            } else {
                eval(alternate, env)
            }
        }
        _ => Err(Error::arity_error(3, args.len())),
    }
}

/// `(define name expr)` binds in the current frame and yields the value
pub(crate) fn eval_define(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            trace!(name = %name, "define");
            Ok(env.define(name.as_str(), value))
        }
        [target, _] => Err(Error::syntax(
            ParseErrorKind::InvalidForm,
            format!("define requires a symbol, got {} {target}", target.type_name()),
        )),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// `(lambda (params...) body)` captures the current environment
pub(crate) fn eval_lambda(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [param_list, body] => {
            let Some(items) = param_list.to_vec() else {
                return Err(Error::syntax(
                    ParseErrorKind::InvalidForm,
                    format!("lambda parameters must be a list, got {param_list}"),
                ));
            };

            let mut seen = HashSet::new();
            let mut params = Vec::with_capacity(items.len());
            for item in items {
                let Value::Symbol(name) = item else {
                    return Err(Error::syntax(
                        ParseErrorKind::InvalidForm,
                        format!("lambda parameters must be symbols, got {item}"),
                    ));
                };
                if !seen.insert(name.clone()) {
                    return Err(Error::syntax(
                        ParseErrorKind::InvalidForm,
                        format!("duplicate parameter name: {name}"),
                    ));
                }
                params.push(name);
            }

            Ok(Value::Closure(Rc::new(Lambda {
                params,
                body: body.clone(),
                env: env.clone(),
            })))
        }
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// Create a global environment holding every primitive procedure
pub fn create_global_env() -> Environment {
    let env = Environment::new_global();

    for builtin_op in get_builtin_ops() {
        if let OpKind::Function(func) = &builtin_op.op_kind {
            let func = Arc::clone(func);
            let arity = builtin_op.arity;
            let checked: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
                arity.validate(args.len())?;
                func(args)
            });
            env.bind_native(builtin_op.id, checked);
        }
    }

    env
}
