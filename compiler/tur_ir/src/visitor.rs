//! Command tree traversal.
//!
//! `Command::for_each_child` enumerates the direct sub-commands of a node,
//! including parameter defaults, call arguments, class bodies and nested
//! flow cells. `Visitor` builds on it: default methods walk the whole tree,
//! overrides hook into specific nodes.
//!
//! # Example
//!
//! ```text
//! struct CountCalls(usize);
//!
//! impl Visitor for CountCalls {
//!     fn visit_command(&mut self, command: &Command) {
//!         if matches!(command, Command::Call { .. }) {
//!             self.0 += 1;
//!         }
//!         walk_command(self, command);
//!     }
//! }
//! ```

use rustc_hash::FxHashSet;

use crate::{Command, Name};

impl Command {
    /// Call `f` on every direct sub-command of this node.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Command)) {
        match self {
            Command::Literal(_)
            | Command::Identifier(_)
            | Command::Pin(_)
            | Command::Unlet(_)
            | Command::Export(_) => {}
            Command::List(items) | Command::Block(items) => items.iter().for_each(f),
            Command::Let { value, .. } | Command::Assign { value, .. } => f(value),
            Command::Global { value, .. } => {
                if let Some(value) = value {
                    f(value);
                }
            }
            Command::FieldAccess { object, .. } => f(object),
            Command::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            Command::Unary { operand, .. } => f(operand),
            Command::If {
                condition,
                then_branch,
                else_branch,
            } => {
                f(condition);
                f(then_branch);
                if let Some(otherwise) = else_branch {
                    f(otherwise);
                }
            }
            Command::While { condition, body } => {
                f(condition);
                f(body);
            }
            Command::Return(value) => {
                if let Some(value) = value {
                    f(value);
                }
            }
            Command::Function(def) => {
                def.params.defaults().for_each(&mut f);
                f(&def.body);
            }
            Command::Class(def) => def.body.iter().for_each(f),
            Command::Call { callee, args } | Command::Curry { callee, args } => {
                f(callee);
                args.iter().for_each(|arg| f(&arg.expr));
            }
            Command::MethodCall { receiver, args, .. } => {
                f(receiver);
                args.iter().for_each(|arg| f(&arg.expr));
            }
            Command::Chain { first, second } => {
                f(first);
                f(second);
            }
            Command::Async { body, options } => {
                let option_commands = [
                    &options.in_capacity,
                    &options.out_capacity,
                    &options.steps,
                    &options.time,
                ];
                for option in option_commands.into_iter().flatten() {
                    f(option);
                }
                f(body);
            }
            Command::Await { target, timeout } => {
                f(target);
                if let Some(timeout) = timeout {
                    f(timeout);
                }
            }
            Command::Yield { value, condition } => {
                f(value);
                if let Some(condition) = condition {
                    f(condition);
                }
            }
            Command::Flow(def) => {
                def.cells.iter().for_each(|cell| f(&cell.command));
                let governance = [&def.exit_condition, &def.limit, &def.timeout, &def.result];
                for command in governance.into_iter().flatten() {
                    f(command);
                }
            }
        }
    }

    /// Every identifier read anywhere in this subtree.
    pub fn referenced_identifiers(&self) -> FxHashSet<Name> {
        let mut collector = IdentifierCollector::default();
        collector.visit_command(self);
        collector.names
    }
}

/// Command tree visitor.
///
/// Override `visit_*` methods for custom behavior; call `walk_command` to
/// continue into children.
pub trait Visitor {
    fn visit_command(&mut self, command: &Command) {
        walk_command(self, command);
    }

    fn visit_identifier(&mut self, _name: &Name) {}
}

/// Visit the children of `command`, dispatching identifiers to
/// `visit_identifier`.
pub fn walk_command<V: Visitor + ?Sized>(visitor: &mut V, command: &Command) {
    if let Command::Identifier(name) = command {
        visitor.visit_identifier(name);
    }
    command.for_each_child(|child| visitor.visit_command(child));
}

#[derive(Default)]
struct IdentifierCollector {
    names: FxHashSet<Name>,
}

impl Visitor for IdentifierCollector {
    fn visit_identifier(&mut self, name: &Name) {
        self.names.insert(name.clone());
    }
}
