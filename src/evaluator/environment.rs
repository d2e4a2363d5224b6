//! Lexical environments.
//!
//! An [`Environment`] is a shared handle to one frame of bindings plus an
//! optional parent. Closures capture the handle, so a closure and the frame
//! it was created in can keep each other alive: a recursive `define` inside a
//! procedure body puts a closure into the very frame it captures. Every frame
//! created from one global environment is tracked (weakly) by a shared
//! registry, which [`Environment::collect`] and [`Environment::release_all`]
//! use to break such cycles.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::Error;
use crate::ast::{Cons, Value};

/// Registry size below which dead entries are not pruned.
const PRUNE_FLOOR: usize = 64;

struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Environment>,
    registry: Rc<FrameRegistry>,
}

#[derive(Default)]
struct FrameRegistry {
    frames: RefCell<Vec<Weak<Frame>>>,
    prune_at: Cell<usize>,
}

impl FrameRegistry {
    fn register(&self, frame: &Rc<Frame>) {
        let mut frames = self.frames.borrow_mut();
        frames.push(Rc::downgrade(frame));
        if frames.len() >= self.prune_at.get().max(PRUNE_FLOOR) {
            frames.retain(|weak| weak.strong_count() > 0);
            self.prune_at.set(frames.len() * 2);
        }
    }

    /// Strong handles to every frame that is still alive.
    fn live_frames(&self) -> Vec<Rc<Frame>> {
        let mut frames = self.frames.borrow_mut();
        frames.retain(|weak| weak.strong_count() > 0);
        frames.iter().filter_map(Weak::upgrade).collect()
    }
}

/// A chain of binding frames.
///
/// Cloning an `Environment` clones the handle, not the bindings: all clones
/// observe the same frame.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Environment {
    /// Create an empty top-level environment with its own frame registry
    pub fn new_global() -> Self {
        let registry = Rc::new(FrameRegistry::default());
        Self::with_frame(None, registry, HashMap::new())
    }

    fn with_frame(
        parent: Option<Environment>,
        registry: Rc<FrameRegistry>,
        bindings: HashMap<String, Value>,
    ) -> Self {
        let frame = Rc::new(Frame {
            bindings: RefCell::new(bindings),
            parent,
            registry,
        });
        frame.registry.register(&frame);
        Environment { frame }
    }

    /// Create an empty child frame whose parent is `self`
    pub fn with_parent(&self) -> Self {
        Self::with_frame(
            Some(self.clone()),
            Rc::clone(&self.frame.registry),
            HashMap::new(),
        )
    }

    /// Create a child frame binding `params` to `args` pairwise.
    ///
    /// The counts must match exactly. Repeated parameter names are rejected
    /// earlier, when the `lambda` form is evaluated.
    pub fn extend(&self, params: &[String], args: Vec<Value>) -> Result<Self, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_error(params.len(), args.len()));
        }
        let bindings = params.iter().cloned().zip(args).collect();
        Ok(Self::with_frame(
            Some(self.clone()),
            Rc::clone(&self.frame.registry),
            bindings,
        ))
    }

    /// Bind `name` in this frame, replacing any existing binding here. Returns the value.
    pub fn define(&self, name: impl Into<String>, value: Value) -> Value {
        let previous = self
            .frame
            .bindings
            .borrow_mut()
            .insert(name.into(), value.clone());
        drop(previous);
        value
    }

    /// Look a name up through the chain, innermost frame first
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.frame.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.frame.parent.as_ref()?;
        }
    }

    /// Like [`get`](Self::get), failing with `UnboundVariable`
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// Whether `name` is bound directly in this frame (ignoring parents)
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.frame.bindings.borrow().contains_key(name)
    }

    /// Whether two handles refer to the same frame
    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    /// Every visible binding, sorted by name. Inner frames shadow outer ones.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut chain = vec![self];
        while let Some(parent) = chain.last().and_then(|env| env.frame.parent.as_ref()) {
            chain.push(parent);
        }

        let mut visible = HashMap::new();
        for env in chain.into_iter().rev() {
            for (name, value) in env.frame.bindings.borrow().iter() {
                visible.insert(name.clone(), value.clone());
            }
        }

        let mut bindings: Vec<_> = visible.into_iter().collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }

    /// Number of frames sharing this environment's registry that are still alive
    pub fn live_frame_count(&self) -> usize {
        self.frame.registry.live_frames().len()
    }

    /// Reclaim frames that can no longer be reached.
    ///
    /// Marks every frame reachable from `self` (its own chain, plus anything
    /// reachable through closures bound in marked frames) and from
    /// `extra_roots`, then clears the bindings of every other live frame in
    /// the registry. Clearing a binding drops the closures it holds, which
    /// releases the reference cycles that kept those frames alive.
    ///
    /// Only call this between top-level evaluations: a frame in use by an
    /// evaluation that is still running is not a root. Returns the number of
    /// frames cleared.
    pub fn collect(&self, extra_roots: &[Value]) -> usize {
        let marked = self.mark(extra_roots);
        let live = self.frame.registry.live_frames();
        let live_count = live.len();

        let mut swept = 0;
        for frame in live {
            if !marked.contains(&Rc::as_ptr(&frame)) {
                let bindings = frame.bindings.take();
                drop(bindings);
                swept += 1;
            }
        }

        debug!(
            live = live_count,
            reachable = marked.len(),
            swept,
            "environment collection"
        );
        swept
    }

    /// Clear the bindings of every live frame sharing this registry, including
    /// the global one. Used when a session is torn down; any closure that
    /// survives the session afterwards finds its captured names unbound.
    pub fn release_all(&self) -> usize {
        let live = self.frame.registry.live_frames();
        let count = live.len();
        for frame in live {
            let bindings = frame.bindings.take();
            drop(bindings);
        }
        debug!(frames = count, "released environment frames");
        count
    }

    fn mark(&self, extra_roots: &[Value]) -> HashSet<*const Frame> {
        let mut marked: HashSet<*const Frame> = HashSet::new();
        let mut seen_pairs: HashSet<*const Cons> = HashSet::new();
        let mut frames = vec![self.clone()];
        let mut values: Vec<Value> = extra_roots.to_vec();

        loop {
            if let Some(env) = frames.pop() {
                if !marked.insert(Rc::as_ptr(&env.frame)) {
                    continue;
                }
                values.extend(env.frame.bindings.borrow().values().cloned());
                if let Some(parent) = &env.frame.parent {
                    frames.push(parent.clone());
                }
            } else if let Some(value) = values.pop() {
                match value {
                    Value::Pair(cell) => {
                        if seen_pairs.insert(Rc::as_ptr(&cell)) {
                            values.push(cell.head.clone());
                            values.push(cell.tail.clone());
                        }
                    }
                    Value::Closure(lambda) => {
                        frames.push(lambda.env.clone());
                        values.push(lambda.body.clone());
                    }
                    Value::Symbol(_)
                    | Value::Number(_)
                    | Value::Nil
                    | Value::NativeProcedure { .. } => {}
                }
            } else {
                break;
            }
        }
        marked
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.same_frame(other)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut env = self;
        while let Some(parent) = &env.frame.parent {
            depth += 1;
            env = parent;
        }
        f.debug_struct("Environment")
            .field("bindings", &self.frame.bindings.borrow().len())
            .field("depth", &depth)
            .finish()
    }
}
