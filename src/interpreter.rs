//! An interpreter session: one global environment plus a reader configuration.

use tracing::debug;

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{Environment, create_global_env, eval};
use crate::reader::{ParseConfig, parse_all_with_config};

/// A persistent session.
///
/// Definitions made by one call are visible to the next. A failing
/// expression aborts only itself; bindings established earlier stay.
///
/// Dropping the session clears every frame it created, so closures that
/// escape it find their captured names unbound afterwards.
pub struct Interpreter {
    env: Environment,
    config: ParseConfig,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(ParseConfig::default())
    }

    pub fn with_config(config: ParseConfig) -> Self {
        Interpreter {
            env: create_global_env(),
            config,
        }
    }

    /// The global environment of this session
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> ParseConfig {
        self.config
    }

    /// Read every expression in `text` without evaluating any of them
    pub fn read(&self, text: &str) -> Result<Vec<Value>, Error> {
        parse_all_with_config(text, self.config)
    }

    /// Evaluate one already-read expression in the global environment
    pub fn eval(&self, expr: &Value) -> Result<Value, Error> {
        eval(expr, &self.env)
    }

    /// Read and evaluate every expression in `text`, in order.
    ///
    /// Nothing is evaluated if the text does not read. Evaluation stops at
    /// the first failing expression; effects of the ones before it persist.
    pub fn eval_str(&self, text: &str) -> Result<Vec<Value>, Error> {
        self.read(text)?
            .iter()
            .map(|expr| self.eval(expr))
            .collect()
    }

    /// Evaluate `text` and return the value of its last expression (`()` if empty)
    pub fn run(&self, text: &str) -> Result<Value, Error> {
        Ok(self.eval_str(text)?.pop().unwrap_or(Value::Nil))
    }

    /// Reclaim frames kept alive only by closure cycles. Values the caller
    /// still holds must be passed in `keep`.
    pub fn collect_garbage(&self, keep: &[Value]) -> usize {
        self.env.collect(keep)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        let frames = self.env.release_all();
        debug!(frames, "interpreter session closed");
    }
}
