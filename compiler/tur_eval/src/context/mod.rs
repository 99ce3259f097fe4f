//! Lexical scopes.
//!
//! A `Context` is a shared handle to one frame of bindings plus a link to its
//! lexical parent. Lookup walks the parent chain and then the global table,
//! which is shared by every Context of one engine (tasks included).
//!
//! # Architecture
//!
//! - Frames sit behind `parking_lot::RwLock` so Contexts are `Send + Sync`.
//!   A lookup holds at most one frame lock at a time.
//! - The caller link is a `Weak` back-reference, used only by `caller()`.
//! - `snapshot()` produces the private, frozen copy a task starts from.
//!
//! Freeze lives on the `Variable`: once frozen, `update` fails and only
//! `force_update` can still write it.

mod variable;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tur_ir::Name;

use crate::errors::{
    already_defined, already_frozen, not_local, undefined_variable, EvalError,
};
use crate::print_handler::SharedPrintHandler;
use crate::value::{ObjectValue, Value};

pub use variable::Variable;

/// Ordered bindings of one scope.
#[derive(Default)]
struct Frame {
    vars: FxHashMap<Name, Variable>,
    order: Vec<Name>,
    /// Names declared `global` in this scope.
    globals: FxHashSet<Name>,
    exports: Vec<Name>,
}

impl Frame {
    fn insert(&mut self, name: Name, var: Variable) {
        if self.vars.insert(name.clone(), var).is_none() {
            self.order.push(name);
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        if self.vars.remove(name).is_some() {
            self.order.retain(|n| n.as_str() != name);
            true
        } else {
            false
        }
    }
}

/// The global table shared by all Contexts of one engine.
#[derive(Default)]
struct Globals {
    vars: RwLock<FxHashMap<Name, Variable>>,
}

struct ContextInner {
    frame: RwLock<Frame>,
    parent: Option<Context>,
    caller: RwLock<Option<Weak<ContextInner>>>,
    globals: Arc<Globals>,
    print_target: RwLock<Option<SharedPrintHandler>>,
}

/// A lexical scope handle. Cloning shares the scope.
#[derive(Clone)]
pub struct Context(Arc<ContextInner>);

impl Context {
    /// A root Context with a fresh global table.
    pub fn new() -> Self {
        Self::with_parts(None, Arc::new(Globals::default()))
    }

    fn with_parts(parent: Option<Context>, globals: Arc<Globals>) -> Self {
        Context(Arc::new(ContextInner {
            frame: RwLock::new(Frame::default()),
            parent,
            caller: RwLock::new(None),
            globals,
            print_target: RwLock::new(None),
        }))
    }

    /// A child scope whose parent is this one (block, loop iteration,
    /// call into a closure captured here).
    pub fn wrap(&self) -> Context {
        Self::with_parts(Some(self.clone()), Arc::clone(&self.0.globals))
    }

    /// A new root scope for a concurrently scheduled task: no parent, same
    /// global table.
    pub fn thread(&self) -> Context {
        Self::with_parts(None, Arc::clone(&self.0.globals))
    }

    /// Expose this scope as an object whose fields are its local bindings.
    pub fn open(&self) -> Value {
        Value::Object(ObjectValue::new(None, self.clone()))
    }

    #[inline]
    pub fn parent(&self) -> Option<&Context> {
        self.0.parent.as_ref()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn chain(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |ctx| ctx.parent())
    }

    // Definition

    /// Define a new local binding, type-checked against `types`.
    /// Fails when the name already exists in this frame.
    pub fn define(&self, name: Name, value: Value, types: Vec<Name>) -> Result<(), EvalError> {
        let var = Variable::typed(name.as_str(), value, types)?;
        let mut frame = self.0.frame.write();
        if frame.vars.contains_key(&name) {
            return Err(already_defined(name.as_str()));
        }
        frame.insert(name, var);
        Ok(())
    }

    /// Set a local binding whether or not it exists. Fails only when the
    /// existing local binding is frozen or rejects the value's type.
    pub fn local(&self, name: Name, value: Value) -> Result<(), EvalError> {
        let mut frame = self.0.frame.write();
        if let Some(var) = frame.vars.get_mut(&name) {
            return var.set(name.as_str(), value);
        }
        frame.insert(name, Variable::new(value));
        Ok(())
    }

    /// Bind a local name unconditionally, replacing any previous binding.
    /// Used for `this`, `cls`, `me`, `.` and collector parameters.
    pub(crate) fn bind(&self, name: Name, value: Value) {
        self.0.frame.write().insert(name, Variable::new(value));
    }

    /// Bind a local name and freeze it.
    pub(crate) fn bind_frozen(&self, name: Name, value: Value) {
        let mut var = Variable::new(value);
        var.freeze();
        self.0.frame.write().insert(name, var);
    }

    /// Put a value straight into the global table without declaring it
    /// global here. Used to install built-ins.
    pub fn set_global(&self, name: Name, value: Value) {
        self.0.globals.vars.write().insert(name, Variable::new(value));
    }

    /// Declare `name` global in this scope: later reads and writes of it
    /// here go to the global table.
    pub fn global(&self, name: Name) -> Result<(), EvalError> {
        let mut frame = self.0.frame.write();
        if frame.vars.contains_key(&name) {
            return Err(EvalError::new(format!(
                "global variable '{name}' is already defined as local"
            )));
        }
        frame.globals.insert(name);
        Ok(())
    }

    /// Declare `name` global and assign it.
    pub fn global_with(&self, name: Name, value: Value) -> Result<(), EvalError> {
        self.global(name.clone())?;
        let mut globals = self.0.globals.vars.write();
        match globals.get_mut(&name) {
            Some(var) => var.set(name.as_str(), value),
            None => {
                globals.insert(name, Variable::new(value));
                Ok(())
            }
        }
    }

    /// Remove a binding from this frame.
    pub fn unlet(&self, name: &str) -> Result<(), EvalError> {
        let mut frame = self.0.frame.write();
        if !frame.remove(name) {
            return Err(not_local(name));
        }
        frame.globals.remove(name);
        Ok(())
    }

    // Lookup

    fn is_declared_global(&self, name: &str) -> bool {
        self.0.frame.read().globals.contains(name)
    }

    fn get_global(&self, name: &str) -> Option<Value> {
        self.0.globals.vars.read().get(name).map(|v| v.get().clone())
    }

    /// Resolve a name through the parent chain, then the global table.
    pub fn get(&self, name: &str) -> Result<Value, EvalError> {
        if self.is_declared_global(name) {
            return self.get_global(name).ok_or_else(|| undefined_variable(name));
        }
        self.get_local(name)
            .or_else(|| self.get_global(name))
            .ok_or_else(|| undefined_variable(name))
    }

    /// Resolve through the parent chain only, ignoring globals.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.chain().find_map(|ctx| ctx.get_frame(name))
    }

    /// The binding in this frame only.
    pub fn get_frame(&self, name: &str) -> Option<Value> {
        self.0.frame.read().vars.get(name).map(|v| v.get().clone())
    }

    /// Whether the name resolves anywhere, globals included.
    pub fn contains(&self, name: &str) -> bool {
        self.contains_local(name) || self.0.globals.vars.read().contains_key(name)
    }

    /// Whether the name resolves through the parent chain.
    pub fn contains_local(&self, name: &str) -> bool {
        self.chain()
            .any(|ctx| ctx.0.frame.read().vars.contains_key(name))
    }

    /// Whether the name is bound in this frame.
    pub fn contains_frame(&self, name: &str) -> bool {
        self.0.frame.read().vars.contains_key(name)
    }

    /// Names bound in this frame, in definition order.
    pub fn keys(&self) -> Vec<Name> {
        self.0.frame.read().order.clone()
    }

    /// Names visible through the parent chain, nearest scope first, each once.
    pub fn all_local_keys(&self) -> Vec<Name> {
        let mut seen = FxHashSet::default();
        let mut keys = Vec::new();
        for ctx in self.chain() {
            for name in &ctx.0.frame.read().order {
                if seen.insert(name.clone()) {
                    keys.push(name.clone());
                }
            }
        }
        keys
    }

    // Mutation

    /// Assign an existing binding: the nearest one in the parent chain, else
    /// the global one. Fails on frozen bindings.
    pub fn update(&self, name: &str, value: Value) -> Result<(), EvalError> {
        self.write_existing(name, value, false)
    }

    /// Like `update`, but bypasses the frozen flag.
    pub fn force_update(&self, name: &str, value: Value) -> Result<(), EvalError> {
        self.write_existing(name, value, true)
    }

    fn write_existing(&self, name: &str, value: Value, force: bool) -> Result<(), EvalError> {
        let assign = |var: &mut Variable, value: Value| {
            if force {
                var.set_forced(name, value)
            } else {
                var.set(name, value)
            }
        };
        if !self.is_declared_global(name) {
            for ctx in self.chain() {
                let mut frame = ctx.0.frame.write();
                if let Some(var) = frame.vars.get_mut(name) {
                    return assign(var, value);
                }
            }
        }
        let mut globals = self.0.globals.vars.write();
        match globals.get_mut(name) {
            Some(var) => assign(var, value),
            None if self.is_declared_global(name) => {
                globals.insert(Name::new(name), Variable::new(value));
                Ok(())
            }
            None => Err(undefined_variable(name)),
        }
    }

    /// Freeze the nearest binding of `name`.
    pub fn freeze(&self, name: &str) -> Result<(), EvalError> {
        let freeze = |var: &mut Variable| {
            if var.is_frozen() {
                return Err(already_frozen(name));
            }
            var.freeze();
            Ok(())
        };
        if !self.is_declared_global(name) {
            for ctx in self.chain() {
                let mut frame = ctx.0.frame.write();
                if let Some(var) = frame.vars.get_mut(name) {
                    return freeze(var);
                }
            }
        }
        match self.0.globals.vars.write().get_mut(name) {
            Some(var) => freeze(var),
            None => Err(undefined_variable(name)),
        }
    }

    /// Whether the nearest binding of `name` is frozen.
    pub fn is_frozen(&self, name: &str) -> bool {
        for ctx in self.chain() {
            if let Some(var) = ctx.0.frame.read().vars.get(name) {
                return var.is_frozen();
            }
        }
        self.0
            .globals
            .vars
            .read()
            .get(name)
            .is_some_and(Variable::is_frozen)
    }

    // Export

    pub fn add_export(&self, name: Name) {
        let mut frame = self.0.frame.write();
        if !frame.exports.contains(&name) {
            frame.exports.push(name);
        }
    }

    pub fn exporting(&self) -> Vec<Name> {
        self.0.frame.read().exports.clone()
    }

    // Caller link

    /// Record the Context a call was made from.
    pub fn set_caller(&self, caller: &Context) {
        *self.0.caller.write() = Some(Arc::downgrade(&caller.0));
    }

    /// The nearest caller link up the parent chain, if it is still alive.
    pub fn caller(&self) -> Option<Context> {
        self.chain().find_map(|ctx| {
            ctx.0
                .caller
                .read()
                .as_ref()
                .and_then(Weak::upgrade)
                .map(Context)
        })
    }

    // Print target

    pub fn set_print_target(&self, handler: SharedPrintHandler) {
        *self.0.print_target.write() = Some(handler);
    }

    /// The nearest print target up the parent chain.
    pub fn print_target(&self) -> Option<SharedPrintHandler> {
        self.chain()
            .find_map(|ctx| ctx.0.print_target.read().as_ref().map(Arc::clone))
    }

    // Copying

    /// A private root Context holding a frozen copy of every binding visible
    /// through the parent chain (nearest wins). Shares only the global table.
    pub fn snapshot(&self) -> Context {
        let copy = self.thread();
        {
            let mut target = copy.0.frame.write();
            let mut seen = FxHashSet::default();
            for ctx in self.chain() {
                let frame = ctx.0.frame.read();
                for name in &frame.order {
                    if !seen.insert(name.clone()) {
                        continue;
                    }
                    if let Some(var) = frame.vars.get(name) {
                        target.insert(name.clone(), var.frozen_copy());
                    }
                }
            }
        }
        if let Some(handler) = self.print_target() {
            copy.set_print_target(handler);
        }
        copy
    }

    /// Copy the local bindings of `other` into this frame, skipping `except`.
    /// Existing bindings keep their slot and widen their types.
    pub fn merge_from(&self, other: &Context, except: &[&str]) -> Result<(), EvalError> {
        if self.ptr_eq(other) {
            return Ok(());
        }
        let source: Vec<(Name, Variable)> = {
            let frame = other.0.frame.read();
            frame
                .order
                .iter()
                .filter(|name| !except.contains(&name.as_str()))
                .filter_map(|name| frame.vars.get(name).map(|v| (name.clone(), v.clone())))
                .collect()
        };
        let mut frame = self.0.frame.write();
        for (name, var) in source {
            match frame.vars.get_mut(&name) {
                Some(existing) => {
                    existing.merge_types(var.types());
                    existing.set(name.as_str(), var.get().clone())?;
                }
                None => frame.insert(name, var),
            }
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
