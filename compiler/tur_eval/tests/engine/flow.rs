//! Reactive flows run to quiescence.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tur_eval::{Channel, Context, EvalErrorKind, Interpreter, Value};
use tur_ir::{Argument, BinaryOp, Command, FlowCell, FlowDef, Name};

use crate::common::setup;

/// `{ runs.send("<cell>"); command }`
fn counted(cell: &str, command: Command) -> Command {
    Command::Block(vec![
        Command::method_call(
            Command::ident("runs"),
            "send",
            vec![Argument::positional(Command::string(cell))],
        ),
        command,
    ])
}

fn with_runs() -> (Interpreter, Context, Channel) {
    let (interp, ctx) = setup();
    let runs = Channel::unbounded();
    ctx.define(Name::new("runs"), Value::Channel(runs.clone()), Vec::new())
        .unwrap();
    (interp, ctx, runs)
}

fn times_run(runs: &Channel, cell: &str) -> usize {
    std::iter::from_fn(|| runs.try_receive())
        .filter(|run| *run == Value::string(cell))
        .count()
}

fn flow(cells: Vec<FlowCell>, result: &str) -> Command {
    let mut def = FlowDef::new(cells);
    def.result = Some(Box::new(Command::ident(result)));
    Command::Flow(Arc::new(def))
}

fn plus(name: &str, n: i64) -> Command {
    Command::binary(BinaryOp::Add, Command::ident(name), Command::int(n))
}

#[test]
fn chain_settles_at_three_running_each_cell_once() {
    let (mut interp, ctx, runs) = with_runs();
    let command = flow(
        vec![
            FlowCell::new("a", counted("a", Command::int(1))),
            FlowCell::new("b", counted("b", plus("a", 1))),
            FlowCell::new("c", counted("c", plus("b", 1))),
        ],
        "c",
    );
    assert_eq!(interp.run(&command, &ctx).unwrap(), Value::Int(3));
    let runs: Vec<Value> = std::iter::from_fn(|| runs.try_receive()).collect();
    assert_eq!(
        runs,
        vec![Value::string("a"), Value::string("b"), Value::string("c")]
    );
}

#[test]
fn constant_cell_triggers_its_dependent_once() {
    // `k` reads both entry cells, so it runs twice; it always yields 7.
    let (mut interp, ctx, runs) = with_runs();
    let k = plus_zeroed(&["a", "b"], 7);
    let command = flow(
        vec![
            FlowCell::new("a", Command::int(1)),
            FlowCell::new("b", Command::int(2)),
            FlowCell::new("k", k),
            FlowCell::new("d", counted("d", plus("k", 1))),
        ],
        "d",
    );
    assert_eq!(interp.run(&command, &ctx).unwrap(), Value::Int(8));
    assert_eq!(times_run(&runs, "d"), 1);
}

/// `a * 0 + b * 0 + ... + constant`
fn plus_zeroed(names: &[&str], constant: i64) -> Command {
    names.iter().fold(Command::int(constant), |acc, name| {
        Command::binary(
            BinaryOp::Add,
            acc,
            Command::binary(BinaryOp::Mul, Command::ident(*name), Command::int(0)),
        )
    })
}

#[test]
fn cells_cannot_write_the_shared_scope() {
    let (mut interp, ctx) = setup();
    ctx.define(Name::new("total"), Value::Int(0), Vec::new())
        .unwrap();
    let command = flow(
        vec![FlowCell::new("x", Command::assign("total", Command::int(9)))],
        "x",
    );
    let err = interp.run(&command, &ctx).unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::TaskExecutionFailure { .. }
    ));
    assert!(matches!(
        err.root_cause().kind,
        EvalErrorKind::FrozenVariableAssignment { .. }
    ));
    assert_eq!(ctx.get("total").unwrap(), Value::Int(0));
}

#[test]
fn counting_flow_stops_at_the_exit_condition() {
    // n = n + 1 with n starting at 0 outside the flow, until n >= 10
    let (mut interp, ctx) = setup();
    ctx.define(Name::new("n"), Value::Int(0), Vec::new()).unwrap();
    let mut def = FlowDef::new(vec![FlowCell::new("n", plus("n", 1))]);
    def.exit_condition = Some(Box::new(Command::binary(
        BinaryOp::GtEq,
        Command::ident("n"),
        Command::int(10),
    )));
    def.result = Some(Box::new(Command::ident("n")));
    let value = interp.run(&Command::Flow(Arc::new(def)), &ctx).unwrap();
    assert_eq!(value, Value::Int(10));
    assert_eq!(ctx.get("n").unwrap(), Value::Int(0));
}
