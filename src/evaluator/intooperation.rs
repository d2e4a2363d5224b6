//! Adapters that turn strongly-typed Rust functions into native procedures.
//!
//! Every native procedure is stored behind the erased [`OperationFn`]
//! signature. The traits here let builtins be written against typed
//! parameters (`f64`, [`Value`], or a typed rest iterator) while argument
//! counting and type checking happen once, in the adapter.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::Error;
use crate::ast::{NumberType, Value};

/// Erased native procedure signature.
///
/// Procedures receive ownership of their evaluated arguments.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

/// Conversion of a single evaluated argument into a typed parameter.
pub trait FromParam: Sized {
    fn from_arg(value: Value) -> Result<Self, Error>;
}

impl FromParam for Value {
    fn from_arg(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromParam for NumberType {
    fn from_arg(value: Value) -> Result<Self, Error> {
        NumberType::try_from(&value)
    }
}

// =====================================================================
// Typed iterators over rest arguments
// =====================================================================

/// Describes how to view a slice of arguments as typed elements.
///
/// `precheck` validates the whole slice before the procedure body runs, so
/// `project` never sees an element of the wrong kind.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project(v: &Value) -> Self::Item<'_>;
}

/// Iterator over a slice of arguments, typed by a [`ValueElementKind`].
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K: ValueElementKind> TypedValueIter<'a, K> {
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }
}

impl<'a, K: ValueElementKind> Iterator for TypedValueIter<'a, K> {
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(K::project)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: ValueElementKind> DoubleEndedIterator for TypedValueIter<'_, K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(K::project)
    }
}

impl<K: ValueElementKind> ExactSizeIterator for TypedValueIter<'_, K> {}
impl<K: ValueElementKind> FusedIterator for TypedValueIter<'_, K> {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project(v: &Value) -> Self::Item<'_> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = NumberType;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        slice.iter().try_for_each(|v| NumberType::try_from(v).map(drop))
    }

    fn project(v: &Value) -> Self::Item<'_> {
        match v {
            Value::Number(n) => *n,
            _ => {
                debug_assert!(false, "NumberKind::project saw a non-number after precheck");
                NumberType::NAN
            }
        }
    }
}

/// Borrowed iterator over arbitrary arguments.
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Borrowed iterator over numeric arguments. Every element was checked to be a
/// number before the procedure body runs.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Registration marker for a numeric rest parameter; the procedure sees a [`NumIter`].
pub type NumRest = NumIter<'static>;

/// Registration marker for an untyped rest parameter; the procedure sees a [`ValueIter`].
pub type ValuesRest = ValueIter<'static>;

/// Construction of a rest parameter from the trailing argument slice.
pub trait FromRest {
    type Param<'a>;

    fn from_rest(slice: &[Value]) -> Result<Self::Param<'_>, Error>;
}

impl<K: ValueElementKind> FromRest for TypedValueIter<'static, K> {
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest(slice: &[Value]) -> Result<Self::Param<'_>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

// =====================================================================
// Adapter traits
// =====================================================================

/// Conversion of a fixed-arity Rust function into an [`OperationFn`].
///
/// `Args` is the tuple of parameter types, which lets one function type
/// implement the trait for exactly one arity. Callers name it explicitly
/// when inference cannot pick it, e.g. `IntoOperation::<(f64, f64)>`.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Conversion of a Rust function whose last parameter is a rest iterator.
///
/// `Args` lists the fixed prefix followed by a rest marker such as
/// [`NumRest`] or [`ValuesRest`].
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> Result<R, Error> + Send + Sync + 'static,
    R: Into<Value>,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }
            (self)().map(Into::into)
        })
    }
}

macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: Fn( $( $A ),+ ) -> Result<R, Error> + Send + Sync + 'static,
            $( $A: FromParam, )+
            R: Into<Value>,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |args: Vec<Value>| {
                    match <[Value; $arity]>::try_from(args) {
                        Ok([ $( $p ),+ ]) => {
                            $( let $p = <$A as FromParam>::from_arg($p)?; )+
                            (self)( $( $p ),+ ).map(Into::into)
                        }
                        Err(args) => Err(Error::arity_error($arity, args.len())),
                    }
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, p0: A1);
impl_into_operation_for_arity!(2, p0: A1, p1: A2);

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> Result<R, Error> + Send + Sync + 'static,
    R: Into<Value>,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let rest = <I as FromRest>::from_rest(&args)?;
            (self)(rest).map(Into::into)
        })
    }
}

impl<F, A1, I, R> IntoVariadicOperation<(A1, I)> for F
where
    A1: FromParam,
    I: FromRest,
    F: for<'a> Fn(A1, <I as FromRest>::Param<'a>) -> Result<R, Error> + Send + Sync + 'static,
    R: Into<Value>,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let Some((first, rest)) = args.split_first() else {
                return Err(Error::arity_error(1, 0));
            };
            let first = A1::from_arg(first.clone())?;
            let rest = <I as FromRest>::from_rest(rest)?;
            (self)(first, rest).map(Into::into)
        })
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    fn call(op: &Arc<OperationFn>, args: Vec<Value>) -> Result<Value, Error> {
        op(args)
    }

    #[test]
    fn test_fixed_arity_adapters() {
        let hypot = IntoOperation::<(NumberType, NumberType)>::into_operation(
            |a: NumberType, b: NumberType| Ok::<_, Error>((a * a + b * b).sqrt()),
        );
        assert_eq!(call(&hypot, vec![val(3), val(4)]).unwrap(), val(5));
        assert_eq!(
            call(&hypot, vec![val(3)]),
            Err(Error::arity_error(2, 1))
        );
        assert!(matches!(
            call(&hypot, vec![val(3), sym("x")]),
            Err(Error::TypeError(_))
        ));

        let identity = IntoOperation::<(Value,)>::into_operation(|v: Value| Ok::<_, Error>(v));
        assert_eq!(call(&identity, vec![sym("a")]).unwrap(), sym("a"));

        let answer = IntoOperation::<()>::into_operation(|| Ok::<_, Error>(42));
        assert_eq!(call(&answer, vec![]).unwrap(), val(42));
        assert_eq!(call(&answer, vec![val(1)]), Err(Error::arity_error(0, 1)));
    }

    #[test]
    fn test_variadic_adapters() {
        fn count(items: ValueIter<'_>) -> Result<NumberType, Error> {
            Ok(items.len() as NumberType)
        }
        fn scaled_sum(factor: NumberType, rest: NumIter<'_>) -> Result<NumberType, Error> {
            Ok(rest.map(|n| n * factor).fold(0.0, |acc, n| acc + n))
        }

        let count = IntoVariadicOperation::<(ValuesRest,)>::into_variadic_operation(count);
        assert_eq!(call(&count, vec![]).unwrap(), val(0));
        assert_eq!(call(&count, vec![sym("a"), val(1)]).unwrap(), val(2));

        let scaled =
            IntoVariadicOperation::<(NumberType, NumRest)>::into_variadic_operation(scaled_sum);
        assert_eq!(call(&scaled, vec![val(2), val(1), val(3)]).unwrap(), val(8));
        assert_eq!(call(&scaled, vec![val(2)]).unwrap(), val(0));
        assert_eq!(call(&scaled, vec![]), Err(Error::arity_error(1, 0)));
        assert!(matches!(
            call(&scaled, vec![val(2), val(1), sym("x")]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_num_iter_is_double_ended() {
        let args = vec![val(1), val(2), val(3)];
        let iter = NumIter::new(&args).unwrap();
        assert_eq!(iter.rev().collect::<Vec<_>>(), vec![3.0, 2.0, 1.0]);
    }
}
