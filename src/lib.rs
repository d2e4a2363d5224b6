//! minilisp - a small Lisp-family interpreter
//!
//! This crate provides a reader that turns text into symbolic expressions, a
//! tree-walking evaluator with a handful of special forms, chained lexical
//! environments, and closures that capture the scope they were defined in.
//!
//! ```scheme
//! (define square (lambda (n) (* n n)))
//! (square 4)                 ; => 16
//! (if (< 1 2) 10 20)         ; => 10
//! (car (cons 1 (list 2 3)))  ; => 1
//! ```
//!
//! ## Semantics in brief
//!
//! - There is one numeric kind (`f64`) and no boolean kind. Comparisons yield
//!   `1` or `0`, and `if` treats only a number equal to zero as false. The
//!   empty list `()` is *true*.
//! - `(/ x)` returns `x` unchanged.
//! - Lambda bodies are a single expression; there is no tail-call elimination,
//!   so recursion depth is bounded by the host stack.
//!
//! ## Modules
//!
//! - `ast`: the runtime value model
//! - `reader`: S-expression tokenizing and parsing
//! - `evaluator`: environments, evaluation and procedure application
//! - `builtinops`: special-form and primitive registry
//! - `printer`: canonical textual rendering of values
//! - `interpreter`: a session that owns the global environment

use std::fmt;

/// Maximum list nesting accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 512;

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Input ended while a list was still open (or there was no input at all)
    Incomplete,
    /// A `)` appeared with no list open
    UnexpectedClose,
    /// Extra input found after a complete expression
    TrailingContent,
    /// A special form whose operands have the wrong shape
    InvalidForm,
    /// Lists nested deeper than [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A structured error providing detailed information about a syntax failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token, if identifiable
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

    /// Create a ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from `input` around a byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let prefix_chars = input
            .get(..error_offset.min(input.len()))
            .map_or(0, |prefix| prefix.chars().count());
        let context_start = prefix_chars.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter.
///
/// Every failure aborts the whole top-level evaluation; none is recovered
/// inside `eval`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    SyntaxError(ParseError),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("{}", format_arity(.expected, .got, .expression))]
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
}

fn format_arity(expected: &usize, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => {
            format!("ArityError: expression {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityError: function expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// Shorthand for a context-free `SyntaxError`
    pub(crate) fn syntax(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Error::SyntaxError(ParseError::from_message(kind, message))
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod interpreter;
pub mod printer;
pub mod reader;

pub use ast::Value;
pub use evaluator::{Environment, eval};
pub use interpreter::Interpreter;
pub use printer::print;
pub use reader::{parse, parse_all};
