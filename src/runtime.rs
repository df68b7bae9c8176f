//! Lexical scoping.
//!
//! A `Scope` is a chain of frames: variables written with `set` always land in
//! the current frame, while `get`/`get_function` walk up through parents.
//! Function values close over a *snapshot* of the defining scope rather than
//! a live reference to it (see `child_scope` vs. `call_frame` below).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::{Function, Value};

struct ScopeInner {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Rc<Function>>,
    parent: Option<Scope>,
}

#[derive(Clone)]
pub struct Scope(Rc<RefCell<ScopeInner>>);

impl Scope {
    pub fn new() -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner {
            variables: HashMap::new(),
            functions: HashMap::new(),
            parent: None,
        })))
    }

    /// A child frame parented to `self`, carrying over the current function
    /// table (mirrors `runtime.py::child_scope`, which copies `functions` but
    /// not `variables` into the new frame).
    pub fn child_scope(&self) -> Scope {
        let functions = self.0.borrow().functions.clone();
        Scope(Rc::new(RefCell::new(ScopeInner {
            variables: HashMap::new(),
            functions,
            parent: Some(self.clone()),
        })))
    }

    /// The frame used to execute a function call. Parented to the function's
    /// *captured* closure environment, not to the caller's live scope — this
    /// is what makes closures see the bindings that existed when the function
    /// was defined rather than whatever the caller's scope holds at call time.
    pub fn call_frame(closure: &Scope) -> Scope {
        closure.child_scope()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().variables.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let inner = self.0.borrow();
        if let Some(v) = inner.variables.get(name) {
            return Some(v.clone());
        }
        match &inner.parent {
            Some(parent) => parent.get(name),
            None => None,
        }
    }

    /// True if `name` is bound in this frame or an ancestor.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn define_function(&self, func: Rc<Function>) {
        self.0.borrow_mut().functions.insert(func.name.clone(), func);
    }

    /// Removes a variable from the current frame only (no parent walk), used
    /// to undo a temporary binding that did not exist before it was set.
    pub fn remove(&self, name: &str) {
        self.0.borrow_mut().variables.remove(name);
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<Function>> {
        let inner = self.0.borrow();
        if let Some(f) = inner.functions.get(name) {
            return Some(f.clone());
        }
        match &inner.parent {
            Some(parent) => parent.get_function(name),
            None => None,
        }
    }

    /// Snapshot of every variable currently visible in this scope chain,
    /// flattened into a single map (parents first, so children shadow).
    /// Used when a function definition captures its closure environment.
    pub fn snapshot_variables(&self) -> HashMap<String, Value> {
        let inner = self.0.borrow();
        let mut map = match &inner.parent {
            Some(parent) => parent.snapshot_variables(),
            None => HashMap::new(),
        };
        map.extend(inner.variables.clone());
        map
    }

    /// A detached scope pre-populated with `vars`, parentless. Used to build
    /// the closure environment for a freshly defined function: a snapshot,
    /// not a live link back to the defining scope.
    pub fn from_snapshot(vars: HashMap<String, Value>, functions: HashMap<String, Rc<Function>>) -> Scope {
        Scope(Rc::new(RefCell::new(ScopeInner {
            variables: vars,
            functions,
            parent: None,
        })))
    }

    pub fn functions_snapshot(&self) -> HashMap<String, Rc<Function>> {
        self.0.borrow().functions.clone()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inherits_parent_variables_but_writes_locally() {
        let parent = Scope::new();
        parent.set("x", Value::Number(1.0));
        let child = parent.child_scope();
        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 1.0));
        child.set("x", Value::Number(2.0));
        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(parent.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn call_frame_sees_closure_not_caller() {
        let defining = Scope::new();
        defining.set("captured", Value::Number(10.0));
        let closure = Scope::from_snapshot(defining.snapshot_variables(), defining.functions_snapshot());

        let caller = Scope::new();
        caller.set("captured", Value::Number(99.0));
        caller.set("only_in_caller", Value::Number(5.0));

        let frame = Scope::call_frame(&closure);
        assert!(matches!(frame.get("captured"), Some(Value::Number(n)) if n == 10.0));
        assert!(frame.get("only_in_caller").is_none());
    }
}
