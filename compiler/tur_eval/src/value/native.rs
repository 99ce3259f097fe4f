//! Callables implemented in Rust.
//!
//! The built-in function registry installs these into the global Context;
//! task handles and channels hand them out as bound methods.

use std::fmt;
use std::sync::Arc;

use tur_ir::Name;

use super::Value;
use crate::context::Context;
use crate::errors::EvalResult;
use crate::interpreter::Interpreter;

/// Native function signature: the running interpreter, the calling Context
/// and the positional argument values.
pub type NativeFn = dyn Fn(&mut Interpreter, &Context, Vec<Value>) -> EvalResult + Send + Sync;

/// A named native callable.
#[derive(Clone)]
pub struct NativeFunction {
    name: Name,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<Name>, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &Context, Vec<Value>) -> EvalResult + Send + Sync + 'static,
    {
        NativeFunction {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn call(&self, interp: &mut Interpreter, ctx: &Context, args: Vec<Value>) -> EvalResult {
        (self.func)(interp, ctx, args)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.func), Arc::as_ptr(&other.func))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}
