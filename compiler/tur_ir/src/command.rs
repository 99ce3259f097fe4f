//! Command tree nodes.
//!
//! The parser (not part of this workspace) produces a tree of `Command`s;
//! the engine walks it. Nodes that are shared with spawned tasks or captured
//! by closures (`FunctionDef` bodies, `async` bodies, flow cells, call
//! arguments) sit behind `Arc` so they can cross thread boundaries without
//! copying the subtree.

use std::fmt;
use std::sync::Arc;

use crate::{Name, ParameterList};

/// Constant values.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
}

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical (short-circuit)
    And,
    Or,
}

impl BinaryOp {
    /// Source-level symbol, used in error messages.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A call-site argument: optionally named, optionally spread.
#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Option<Name>,
    /// `..expr`: expand a list into positionals or an object into named arguments.
    pub spread: bool,
    pub expr: Arc<Command>,
}

impl Argument {
    pub fn positional(expr: Command) -> Self {
        Argument {
            name: None,
            spread: false,
            expr: Arc::new(expr),
        }
    }

    pub fn named(name: impl Into<Name>, expr: Command) -> Self {
        Argument {
            name: Some(name.into()),
            spread: false,
            expr: Arc::new(expr),
        }
    }

    pub fn spread(expr: Command) -> Self {
        Argument {
            name: None,
            spread: true,
            expr: Arc::new(expr),
        }
    }
}

/// Whether a function literal evaluates its arguments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    /// Arguments are evaluated before the body runs.
    Closure,
    /// Arguments arrive as unevaluated commands.
    Macro,
}

/// A closure or macro literal (`fn name(params) { body }`).
#[derive(Clone, Debug)]
pub struct FunctionDef {
    /// Named definitions are also bound in the defining Context.
    pub name: Option<Name>,
    pub kind: FunctionKind,
    pub params: ParameterList,
    pub return_types: Vec<Name>,
    pub body: Arc<Command>,
}

impl FunctionDef {
    pub fn closure(name: Option<Name>, params: ParameterList, body: Command) -> Self {
        FunctionDef {
            name,
            kind: FunctionKind::Closure,
            params,
            return_types: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn macro_def(name: Option<Name>, params: ParameterList, body: Command) -> Self {
        FunctionDef {
            kind: FunctionKind::Macro,
            ..Self::closure(name, params, body)
        }
    }

    #[must_use]
    pub fn with_return_types(mut self, types: impl IntoIterator<Item = impl Into<Name>>) -> Self {
        self.return_types = types.into_iter().map(Into::into).collect();
        self
    }
}

/// A class definition. The body runs once in the class Context; whatever it
/// defines (typically methods, including `init`) becomes the class's fields.
#[derive(Clone, Debug)]
pub struct ClassDef {
    pub name: Name,
    pub parents: Vec<Name>,
    pub body: Vec<Command>,
}

/// Options of an `async` command. Each is evaluated in the spawning Context.
#[derive(Clone, Debug, Default)]
pub struct AsyncOptions {
    /// Capacity of the spawner-to-task channel.
    pub in_capacity: Option<Box<Command>>,
    /// Capacity of the task-to-spawner channel.
    pub out_capacity: Option<Box<Command>>,
    /// Step limit of the task's interpreter.
    pub steps: Option<Box<Command>>,
    /// Time limit in seconds.
    pub time: Option<Box<Command>>,
}

/// A named reactive computation of a flow.
#[derive(Clone, Debug)]
pub struct FlowCell {
    pub id: Name,
    pub command: Arc<Command>,
}

impl FlowCell {
    pub fn new(id: impl Into<Name>, command: Command) -> Self {
        FlowCell {
            id: id.into(),
            command: Arc::new(command),
        }
    }
}

/// A flow block: cells plus optional governance expressions.
#[derive(Clone, Debug, Default)]
pub struct FlowDef {
    pub id: Option<Name>,
    pub cells: Vec<FlowCell>,
    /// `until`: stops scheduling once true.
    pub exit_condition: Option<Box<Command>>,
    /// Maximum number of dependent reschedules.
    pub limit: Option<Box<Command>>,
    /// Wall-clock timeout in seconds.
    pub timeout: Option<Box<Command>>,
    /// `yield`: evaluated against the final shared Context.
    pub result: Option<Box<Command>>,
}

impl FlowDef {
    pub fn new(cells: Vec<FlowCell>) -> Self {
        FlowDef {
            cells,
            ..Self::default()
        }
    }
}

/// A command tree node.
#[derive(Clone, Debug)]
pub enum Command {
    Literal(Literal),
    Identifier(Name),
    /// `[a, b, c]`
    List(Vec<Command>),
    /// `{ ... }`, executed in a wrapped Context.
    Block(Vec<Command>),
    /// `let name: types = value`
    Let {
        name: Name,
        types: Vec<Name>,
        value: Box<Command>,
    },
    /// `pin a, b`
    Pin(Vec<Name>),
    Unlet(Name),
    /// `global name [= value]`
    Global {
        name: Name,
        value: Option<Box<Command>>,
    },
    /// `name = value`
    Assign {
        name: Name,
        value: Box<Command>,
    },
    /// `object.field`
    FieldAccess {
        object: Box<Command>,
        field: Name,
    },
    Binary {
        op: BinaryOp,
        left: Box<Command>,
        right: Box<Command>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Command>,
    },
    If {
        condition: Box<Command>,
        then_branch: Box<Command>,
        else_branch: Option<Box<Command>>,
    },
    While {
        condition: Box<Command>,
        body: Box<Command>,
    },
    Return(Option<Box<Command>>),
    Function(Arc<FunctionDef>),
    Class(Arc<ClassDef>),
    /// `callee(args)`
    Call {
        callee: Box<Command>,
        args: Vec<Argument>,
    },
    /// `receiver.method(args)`
    MethodCall {
        receiver: Box<Command>,
        method: Name,
        args: Vec<Argument>,
    },
    /// `callee.(args)`: partial application.
    Curry {
        callee: Box<Command>,
        args: Vec<Argument>,
    },
    /// `first ## second`
    Chain {
        first: Box<Command>,
        second: Box<Command>,
    },
    Async {
        body: Arc<Command>,
        options: AsyncOptions,
    },
    Await {
        target: Box<Command>,
        timeout: Option<Box<Command>>,
    },
    /// `yield value [if condition]`
    Yield {
        value: Box<Command>,
        condition: Option<Box<Command>>,
    },
    Flow(Arc<FlowDef>),
    /// `export a, b`
    Export(Vec<Name>),
}

// Constructors used by tests and by embedders that build trees by hand.
impl Command {
    pub fn none() -> Self {
        Command::Literal(Literal::None)
    }

    pub fn boolean(value: bool) -> Self {
        Command::Literal(Literal::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Command::Literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Command::Literal(Literal::Float(value))
    }

    pub fn string(value: &str) -> Self {
        Command::Literal(Literal::Str(Arc::from(value)))
    }

    pub fn ident(name: impl Into<Name>) -> Self {
        Command::Identifier(name.into())
    }

    pub fn let_(name: impl Into<Name>, value: Command) -> Self {
        Command::Let {
            name: name.into(),
            types: Vec::new(),
            value: Box::new(value),
        }
    }

    pub fn assign(name: impl Into<Name>, value: Command) -> Self {
        Command::Assign {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinaryOp, left: Command, right: Command) -> Self {
        Command::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn field(object: Command, field: impl Into<Name>) -> Self {
        Command::FieldAccess {
            object: Box::new(object),
            field: field.into(),
        }
    }

    pub fn call(callee: Command, args: Vec<Argument>) -> Self {
        Command::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn method_call(receiver: Command, method: impl Into<Name>, args: Vec<Argument>) -> Self {
        Command::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        }
    }

    pub fn function(def: FunctionDef) -> Self {
        Command::Function(Arc::new(def))
    }

    pub fn async_(body: Command) -> Self {
        Command::Async {
            body: Arc::new(body),
            options: AsyncOptions::default(),
        }
    }

    pub fn await_(target: Command) -> Self {
        Command::Await {
            target: Box::new(target),
            timeout: None,
        }
    }

    pub fn ret(value: Command) -> Self {
        Command::Return(Some(Box::new(value)))
    }
}
