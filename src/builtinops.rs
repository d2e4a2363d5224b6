//! Registry of built-in operations.
//!
//! Every name the evaluator treats specially and every primitive procedure in
//! the global environment is described once here, with its arity.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive evaluated arguments (e.g. `+`, `car`, `list`)
//! - **Special Forms**: receive their operands unevaluated and decide what to
//!   evaluate (`quote`, `if`, `define`, `lambda`)
//!
//! Special forms are recognized by the evaluator whenever they head a form,
//! regardless of what the name is bound to. Functions are installed into each
//! new global environment by [`create_global_env`](crate::evaluator::create_global_env).
//!
//! ## Numbers and truth
//!
//! All arithmetic is `f64`. Predicates and comparisons return `1` for true
//! and `0` for false.
//!
//! ## Adding New Operations
//!
//! 1. Write the function against typed parameters (`f64`, `Value`,
//!    `NumIter<'_>`, `ValueIter<'_>`), returning `Result<T, Error>`
//! 2. Add a `BuiltinOp` entry to `BUILTIN_OPS` with its identifier and arity
//! 3. Add cases to the tests below

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, NumIter, NumRest, OperationFn, ValueIter, ValuesRest,
};
use crate::evaluator::{Environment, eval_define, eval_if, eval_lambda, eval_quote};

/// Signature of a special form: unevaluated operands and the current environment
pub type SpecialFormFn = fn(&[Value], &Environment) -> Result<Value, Error>;

/// Represents the implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Procedure taking evaluated arguments
    Function(Arc<OperationFn>),
    /// Form that controls the evaluation of its own operands
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
}

impl Arity {
    /// Check an argument count, reporting the nearest accepted count on failure
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if got != n => Err(Error::arity_error(n, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(min, _) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(_, max) if got > max => Err(Error::arity_error(max, got)),
            _ => Ok(()),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name this operation is reached by
    pub id: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }
}

//
// Builtin Function Implementations
//

macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> Result<bool, Error> {
            Ok(a $op b)
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);
numeric_comparison!(builtin_num_eq, ==);

fn builtin_add(args: NumIter<'_>) -> Result<NumberType, Error> {
    Ok(args.fold(0.0, |acc, n| acc + n))
}

fn builtin_mul(args: NumIter<'_>) -> Result<NumberType, Error> {
    Ok(args.fold(1.0, |acc, n| acc * n))
}

fn builtin_sub(first: NumberType, rest: NumIter<'_>) -> Result<NumberType, Error> {
    let mut rest = rest.peekable();
    if rest.peek().is_none() {
        return Ok(-first);
    }
    Ok(rest.fold(first, |acc, n| acc - n))
}

/// `(/ x)` is `x`; division by zero follows IEEE-754
fn builtin_div(first: NumberType, rest: NumIter<'_>) -> Result<NumberType, Error> {
    Ok(rest.fold(first, |acc, n| acc / n))
}

fn builtin_abs(n: NumberType) -> Result<NumberType, Error> {
    Ok(n.abs())
}

/// Rounds half away from zero
fn builtin_round(n: NumberType) -> Result<NumberType, Error> {
    Ok(n.round())
}

fn builtin_max(first: NumberType, rest: NumIter<'_>) -> Result<NumberType, Error> {
    Ok(rest.fold(first, NumberType::max))
}

fn builtin_min(first: NumberType, rest: NumIter<'_>) -> Result<NumberType, Error> {
    Ok(rest.fold(first, NumberType::min))
}

fn builtin_car(pair: Value) -> Result<Value, Error> {
    match pair {
        Value::Pair(cell) => Ok(cell.head.clone()),
        other => Err(Error::TypeError(format!(
            "car expects a pair, got {} {other}",
            other.type_name()
        ))),
    }
}

fn builtin_cdr(pair: Value) -> Result<Value, Error> {
    match pair {
        Value::Pair(cell) => Ok(cell.tail.clone()),
        other => Err(Error::TypeError(format!(
            "cdr expects a pair, got {} {other}",
            other.type_name()
        ))),
    }
}

fn builtin_cons(head: Value, tail: Value) -> Result<Value, Error> {
    Ok(Value::cons(head, tail))
}

fn builtin_list(args: ValueIter<'_>) -> Result<Value, Error> {
    Ok(Value::list(args.cloned()))
}

fn builtin_length(list: Value) -> Result<NumberType, Error> {
    let mut iter = list.iter();
    let count = iter.by_ref().count();
    if iter.remainder().is_nil() {
        Ok(count as NumberType)
    } else {
        Err(Error::TypeError(format!(
            "length expects a proper list, got {list}"
        )))
    }
}

fn builtin_append(lists: ValueIter<'_>) -> Result<Value, Error> {
    let mut items = Vec::new();
    for list in lists {
        let Some(elements) = list.to_vec() else {
            return Err(Error::TypeError(format!(
                "append expects proper lists, got {} {list}",
                list.type_name()
            )));
        };
        items.extend(elements);
    }
    Ok(Value::list(items))
}

fn builtin_not(value: Value) -> Result<bool, Error> {
    Ok(!value.is_truthy())
}

fn builtin_is_null(value: Value) -> Result<bool, Error> {
    Ok(value.is_nil())
}

fn builtin_is_number(value: Value) -> Result<bool, Error> {
    Ok(matches!(value, Value::Number(_)))
}

fn builtin_is_symbol(value: Value) -> Result<bool, Error> {
    Ok(matches!(value, Value::Symbol(_)))
}

fn builtin_is_procedure(value: Value) -> Result<bool, Error> {
    Ok(value.is_procedure())
}

fn builtin_is_list(value: Value) -> Result<bool, Error> {
    Ok(value.is_list())
}

fn builtin_equal(a: Value, b: Value) -> Result<bool, Error> {
    Ok(a == b)
}

fn builtin_eq(a: Value, b: Value) -> Result<bool, Error> {
    Ok(a.is_identical(&b))
}

/// Global registry of all built-in operations, wired through the typed
/// adapter layer once at initialization.
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

    fn function(id: &'static str, arity: Arity, func: Arc<OperationFn>) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::Function(func),
            arity,
        }
    }

    fn special_form(id: &'static str, arity: Arity, form: SpecialFormFn) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::SpecialForm(form),
            arity,
        }
    }

    type Num = NumberType;
    type NumPair = (NumberType, NumberType);
    type NumAndRest = (NumberType, NumRest);

    vec![
        // Special forms
        special_form("quote", Arity::Exact(1), eval_quote),
        special_form("if", Arity::Exact(3), eval_if),
        special_form("define", Arity::Exact(2), eval_define),
        special_form("lambda", Arity::Exact(2), eval_lambda),
        // Arithmetic
        function("+", Arity::AtLeast(0), builtin_variadic::<(NumRest,), _>(builtin_add)),
        function("-", Arity::AtLeast(1), builtin_variadic::<NumAndRest, _>(builtin_sub)),
        function("*", Arity::AtLeast(0), builtin_variadic::<(NumRest,), _>(builtin_mul)),
        function("/", Arity::AtLeast(1), builtin_variadic::<NumAndRest, _>(builtin_div)),
        function("abs", Arity::Exact(1), builtin_fixed::<(Num,), _>(builtin_abs)),
        function("round", Arity::Exact(1), builtin_fixed::<(Num,), _>(builtin_round)),
        function("max", Arity::AtLeast(1), builtin_variadic::<NumAndRest, _>(builtin_max)),
        function("min", Arity::AtLeast(1), builtin_variadic::<NumAndRest, _>(builtin_min)),
        // Comparison
        function("<", Arity::Exact(2), builtin_fixed::<NumPair, _>(builtin_lt)),
        function(">", Arity::Exact(2), builtin_fixed::<NumPair, _>(builtin_gt)),
        function("<=", Arity::Exact(2), builtin_fixed::<NumPair, _>(builtin_le)),
        function(">=", Arity::Exact(2), builtin_fixed::<NumPair, _>(builtin_ge)),
        function("=", Arity::Exact(2), builtin_fixed::<NumPair, _>(builtin_num_eq)),
        // Pairs and lists
        function("car", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_car)),
        function("cdr", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_cdr)),
        function("cons", Arity::Exact(2), builtin_fixed::<(Value, Value), _>(builtin_cons)),
        function("list", Arity::AtLeast(0), builtin_variadic::<(ValuesRest,), _>(builtin_list)),
        function("length", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_length)),
        function("append", Arity::AtLeast(0), builtin_variadic::<(ValuesRest,), _>(builtin_append)),
        // Predicates
        function("not", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_not)),
        function("null?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_is_null)),
        function("number?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_is_number)),
        function("symbol?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_is_symbol)),
        function("procedure?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_is_procedure)),
        function("list?", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_is_list)),
        function("equal?", Arity::Exact(2), builtin_fixed::<(Value, Value), _>(builtin_equal)),
        function("eq?", Arity::Exact(2), builtin_fixed::<(Value, Value), _>(builtin_eq)),
    ]
});

/// Lazy static map from id to BuiltinOp
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// All built-in operations, special forms first
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a built-in operation of either kind by name
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}

/// Find a special form by name
pub(crate) fn find_special_form(id: &str) -> Option<&'static BuiltinOp> {
    find_builtin_op(id).filter(|op| op.is_special_form())
}
