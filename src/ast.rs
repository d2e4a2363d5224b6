//! This module defines the runtime value model of the interpreter. The main enum,
//! [`Value`], is a closed tagged union over symbols, numbers, cons pairs, the empty
//! list, native procedures and closures. Source code and data share this one
//! representation: the reader produces `Value` trees and the evaluator reduces them
//! to `Value` results.
//!
//! Ergonomic helper functions such as [`val`], [`sym`], [`num`] and [`nil`] are
//! provided for building values in code and tests, and conversion traits turn Rust
//! numbers, arrays, slices and vectors into numbers and proper lists.

use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::evaluator::Environment;
use crate::evaluator::intooperation::OperationFn;

/// Type alias for number values in interpreter
pub type NumberType = f64;

/// Core value type in interpreter
///
/// To build values, use the helper functions:
/// - `num(42)` or `val(42)` for numbers, `sym("name")` for symbols, `nil()` for `()`
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Identifiers; equal iff their names are equal
    Symbol(String),
    /// The sole numeric kind
    Number(NumberType),
    /// A cons cell. Proper lists are chains of pairs ending in `Nil`.
    Pair(Rc<Cons>),
    /// The empty list
    Nil,
    /// Built-in procedures, compared by id rather than by function pointer
    NativeProcedure { id: String, func: Arc<OperationFn> },
    /// User-defined procedures (params, body, defining environment)
    Closure(Rc<Lambda>),
}

/// A cons cell.
pub struct Cons {
    pub head: Value,
    pub tail: Value,
}

// Long lists would otherwise be freed by one recursive drop per element.
impl Drop for Cons {
    fn drop(&mut self) {
        let mut tail = std::mem::replace(&mut self.tail, Value::Nil);
        while let Value::Pair(cell) = tail {
            match Rc::try_unwrap(cell) {
                Ok(mut cons) => tail = std::mem::replace(&mut cons.tail, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// A user-defined procedure.
///
/// `env` is the environment the `lambda` form was evaluated in. It is shared,
/// never copied, so every closure created in one frame sees the same bindings.
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Value,
    pub env: Environment,
}

impl Value {
    /// Build a single cons cell
    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Rc::new(Cons { head, tail }))
    }

    /// Build a proper list from elements in order
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::cons(head, tail))
    }

    /// Iterate over the elements of a list. Iteration stops at the first tail that
    /// is not a pair; use [`ListIter::remainder`] to tell proper lists from improper ones.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// Collect the elements of a proper list, or `None` if `self` is not one
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        let mut iter = self.iter();
        let items: Vec<Value> = iter.by_ref().cloned().collect();
        iter.remainder().is_nil().then_some(items)
    }

    /// Check if a value is the empty list
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Check if a value is `Nil` or a chain of pairs terminated by `Nil`
    pub fn is_list(&self) -> bool {
        let mut iter = self.iter();
        for _ in iter.by_ref() {}
        iter.remainder().is_nil()
    }

    /// Truthiness used by `if`: a number equal to zero is false, everything else
    /// (including `Nil`) is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Number(n) if *n == 0.0)
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::NativeProcedure { .. } | Value::Closure(_))
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Symbol(_) => "symbol",
            Value::Number(_) => "number",
            Value::Pair(_) => "pair",
            Value::Nil => "nil",
            Value::NativeProcedure { .. } => "native procedure",
            Value::Closure(_) => "closure",
        }
    }

    /// Identity comparison used by `eq?`: atoms by value, pairs and closures by allocation
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

/// Borrowed iterator over the elements of a (possibly improper) list.
pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> ListIter<'a> {
    /// What is left of the list: `Nil` after a proper list has been consumed,
    /// or the non-pair tail of an improper one.
    pub fn remainder(&self) -> &'a Value {
        self.current
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(cell) => {
                self.current = &cell.tail;
                Some(&cell.head)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Nil => write!(f, "Nil"),
            Value::Pair(_) => {
                write!(f, "List(")?;
                let mut iter = self.iter();
                for (i, v) in iter.by_ref().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                if !iter.remainder().is_nil() {
                    write!(f, " . {:?}", iter.remainder())?;
                }
                write!(f, ")")
            }
            Value::NativeProcedure { id, .. } => write!(f, "NativeProcedure({id})"),
            Value::Closure(lambda) => {
                write!(f, "Closure(params={:?}, body={:?})", lambda.params, lambda.body)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(_), Value::Pair(_)) => {
                // Walk the spine iteratively; only heads recurse
                let (mut left, mut right) = (self.iter(), other.iter());
                loop {
                    match (left.next(), right.next()) {
                        (Some(x), Some(y)) if x == y => continue,
                        (None, None) => return left.remainder() == right.remainder(),
                        _ => return false,
                    }
                }
            }
            (Value::NativeProcedure { id: id1, .. }, Value::NativeProcedure { id: id2, .. }) => {
                id1 == id2
            }
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false, // Different variants are never equal
        }
    }
}

// From trait implementations for Value - enables .into() conversion

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

// Only integer types that convert to f64 losslessly
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(Into::into))
    }
}

impl TryFrom<&Value> for NumberType {
    type Error = Error;

    fn try_from(value: &Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(*n)
        } else {
            Err(Error::TypeError(format!(
                "expected number, got {} {value}",
                value.type_name()
            )))
        }
    }
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating numbers
pub fn num<N: Into<NumberType>>(n: N) -> Value {
    Value::Number(n.into())
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for the empty list
pub fn nil() -> Value {
    Value::Nil
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        // (helper_result, expected_value)
        let test_cases = vec![
            (val(42), Value::Number(42.0)),
            (val(-17), Value::Number(-17.0)),
            (val(2.5), Value::Number(2.5)),
            (val(255u8), Value::Number(255.0)),
            (num(-128i8), Value::Number(-128.0)),
            (val(true), Value::Number(1.0)),
            (val(false), Value::Number(0.0)),
            (sym("foo-bar?"), Value::Symbol("foo-bar?".to_owned())),
            (sym(String::from("test")), Value::Symbol("test".to_owned())),
            (nil(), Value::Nil),
            (
                val([1, 2]),
                Value::cons(val(1), Value::cons(val(2), Value::Nil)),
            ),
            (
                val(vec![sym("op"), val(42)]),
                Value::cons(sym("op"), Value::cons(val(42), Value::Nil)),
            ),
            (val(Vec::<Value>::new()), Value::Nil),
            (val(&[3, 4][..]), val([3, 4])),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_list_shape_queries() {
        let proper = val([1, 2, 3]);
        let improper = Value::cons(val(1), val(2));

        assert!(proper.is_list());
        assert!(nil().is_list());
        assert!(!improper.is_list());
        assert!(!val(5).is_list());

        assert_eq!(proper.to_vec(), Some(vec![val(1), val(2), val(3)]));
        assert_eq!(improper.to_vec(), None);
        assert_eq!(nil().to_vec(), Some(vec![]));
    }

    #[test]
    fn test_truthiness() {
        assert!(!val(0).is_truthy());
        assert!(!val(-0.0).is_truthy());
        assert!(val(1).is_truthy());
        assert!(val(f64::NAN).is_truthy());
        assert!(nil().is_truthy());
        assert!(sym("x").is_truthy());
    }

    #[test]
    fn test_equality_and_identity() {
        let a = val([1, 2]);
        let b = val([1, 2]);
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));
        assert!(a.is_identical(&a.clone()));
        assert_ne!(val([1, 2]), val([1, 2, 3]));
        assert_ne!(Value::cons(val(1), val(2)), val([1, 2]));
        assert_ne!(sym("1"), val(1));
        assert!(sym("x").is_identical(&sym("x")));
    }

    #[test]
    fn test_dropping_long_list_does_not_overflow() {
        let long = Value::list((0..200_000).map(|n| val(n)));
        assert!(long.is_list());
        drop(long);
    }
}
