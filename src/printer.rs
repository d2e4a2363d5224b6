//! Canonical textual rendering of values.
//!
//! The output of [`print`] for symbols, numbers and proper lists reads back
//! through [`crate::reader::parse`] to an equal value. Procedures print as
//! opaque `#<...>` placeholders, which the reader turns into a symbol rather
//! than a procedure.

use std::fmt;

use crate::ast::Value;

/// Render a value as text
pub fn print(value: &Value) -> String {
    value.to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Symbol(s) => write!(f, "{s}"),
            // Rust's float Display is the shortest text that parses back to the same f64
            Value::Number(n) => write!(f, "{n}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(_) => {
                write!(f, "(")?;
                let mut iter = self.iter();
                for (i, elem) in iter.by_ref().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                let rest = iter.remainder();
                if !rest.is_nil() {
                    write!(f, " . {rest}")?;
                }
                write!(f, ")")
            }
            Value::NativeProcedure { id, .. } => write!(f, "#<procedure:{id}>"),
            Value::Closure(_) => write!(f, "#<procedure>"),
        }
    }
}
