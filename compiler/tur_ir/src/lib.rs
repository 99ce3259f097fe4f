//! Tur IR - command tree types for the Turicum engine.
//!
//! This crate contains the data the engine executes:
//! - `Name` for identifiers
//! - `Command` and its payloads (`Argument`, `FunctionDef`, `ClassDef`, `FlowDef`, ...)
//! - `ParameterList` for declared parameters
//! - `Visitor` for tree traversal
//!
//! Nothing here evaluates anything; see `tur_eval`.

mod command;
mod name;
mod params;
pub mod visitor;

pub use command::{
    Argument, AsyncOptions, BinaryOp, ClassDef, Command, FlowCell, FlowDef, FunctionDef,
    FunctionKind, Literal, UnaryOp,
};
pub use name::{special, Name};
pub use params::{ParamError, ParamKind, Parameter, ParameterList};
pub use visitor::{walk_command, Visitor};
