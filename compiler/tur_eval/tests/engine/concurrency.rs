//! Channels and tasks.

use pretty_assertions::assert_eq;
use tur_eval::{Channel, EvalErrorKind, Value};
use tur_ir::{Argument, BinaryOp, Command, ParameterList};

use crate::common::{call, eval, function, run, setup};

fn method(receiver: &str, name: &str, args: Vec<Command>) -> Command {
    Command::method_call(
        Command::ident(receiver),
        name,
        args.into_iter().map(Argument::positional).collect(),
    )
}

fn await_with_timeout(target: Command, seconds: f64) -> Command {
    Command::Await {
        target: Box::new(target),
        timeout: Some(Box::new(Command::float(seconds))),
    }
}

#[test]
fn single_slot_channel() {
    let ch = Channel::new(Some(1));
    ch.send(Value::string("x")).unwrap();
    assert!(!ch.try_send(Value::string("y")));
    assert_eq!(ch.receive().unwrap(), Value::string("x"));
    assert_eq!(ch.try_receive(), None);

    ch.close();
    ch.close();
    assert_eq!(ch.try_receive(), None);
    let err = ch.receive().unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::ChannelClosed);
}

#[test]
fn channel_builtin_connects_two_tasks() {
    // let ch = channel(1); async { ch.send(1); ch.send(2); ch.close() };
    // await async { ch.receive() + ch.receive() }
    let producer = Command::async_(Command::Block(vec![
        method("ch", "send", vec![Command::int(1)]),
        method("ch", "send", vec![Command::int(2)]),
        method("ch", "close", Vec::new()),
    ]));
    let consumer = Command::async_(Command::binary(
        BinaryOp::Add,
        method("ch", "receive", Vec::new()),
        method("ch", "receive", Vec::new()),
    ));
    let value = eval(vec![
        Command::let_("ch", call("channel", vec![Command::int(1)])),
        producer,
        Command::await_(consumer),
    ]);
    assert_eq!(value.unwrap(), Value::Int(3));
}

#[test]
fn task_cannot_write_the_spawner_scope() {
    let (mut interp, ctx) = setup();
    let err = run(
        &mut interp,
        &ctx,
        vec![
            Command::let_("s", Command::int(1)),
            Command::await_(Command::async_(Command::assign("s", Command::int(2)))),
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::TaskExecutionFailure { .. }
    ));
    assert!(matches!(
        err.root_cause().kind,
        EvalErrorKind::FrozenVariableAssignment { .. }
    ));
    assert_eq!(ctx.get("s").unwrap(), Value::Int(1));
}

#[test]
fn task_shadowing_leaves_the_spawner_alone() {
    let value = eval(vec![
        Command::let_("s", Command::int(1)),
        Command::let_(
            "t",
            Command::async_(Command::let_("s", Command::int(2))),
        ),
        Command::List(vec![
            Command::await_(Command::ident("t")),
            Command::ident("s"),
        ]),
    ]);
    assert_eq!(
        value.unwrap(),
        Value::list(vec![Value::Int(2), Value::Int(1)])
    );
}

#[test]
fn spawner_and_task_exchange_messages() {
    // let t = async { let v = incoming(); yield v * 2; v + 1 }
    let body = Command::Block(vec![
        Command::let_("v", call("incoming", Vec::new())),
        Command::Yield {
            value: Box::new(Command::binary(
                BinaryOp::Mul,
                Command::ident("v"),
                Command::int(2),
            )),
            condition: None,
        },
        Command::binary(BinaryOp::Add, Command::ident("v"), Command::int(1)),
    ]);
    let value = eval(vec![
        Command::let_("t", Command::async_(body)),
        method("t", "send", vec![Command::int(21)]),
        Command::List(vec![
            method("t", "receive", Vec::new()),
            Command::await_(Command::ident("t")),
        ]),
    ]);
    assert_eq!(
        value.unwrap(),
        Value::list(vec![Value::Int(42), Value::Int(22)])
    );
}

#[test]
fn await_timeout_returns_none_and_the_task_keeps_running() {
    let value = eval(vec![
        Command::let_("t", Command::async_(call("incoming", Vec::new()))),
        Command::let_(
            "early",
            await_with_timeout(Command::ident("t"), 0.05),
        ),
        Command::let_("running", Command::Unary {
            op: tur_ir::UnaryOp::Not,
            operand: Box::new(method("t", "is_done", Vec::new())),
        }),
        method("t", "close", Vec::new()),
        Command::List(vec![
            Command::ident("early"),
            Command::ident("running"),
            Command::await_(Command::ident("t")),
        ]),
    ]);
    assert_eq!(
        value.unwrap(),
        Value::list(vec![Value::None, Value::Bool(true), Value::None])
    );
}

#[test]
fn awaiting_a_list_races_the_tasks() {
    let slow = Command::Block(vec![
        call("sleep", vec![Command::float(0.3)]),
        Command::string("slow"),
    ]);
    let value = eval(vec![Command::await_(Command::async_(Command::List(vec![
        slow,
        Command::string("fast"),
    ])))]);
    assert_eq!(value.unwrap(), Value::string("fast"));
}

#[test]
fn task_failure_names_the_task_and_its_frames() {
    // fn explode(x) { x / 0 }; await async { explode(1) }
    let value = eval(vec![
        function(
            "explode",
            ParameterList::simple(["x"]).unwrap(),
            Command::binary(BinaryOp::Div, Command::ident("x"), Command::int(0)),
        ),
        Command::await_(Command::async_(call("explode", vec![Command::int(1)]))),
    ]);
    let err = value.unwrap_err();
    let EvalErrorKind::TaskExecutionFailure { task } = &err.kind else {
        panic!("expected a task failure, got {:?}", err.kind);
    };
    assert!(task.starts_with("task-"));
    assert_eq!(err.root_cause().kind, EvalErrorKind::DivisionByZero);
    let frames: Vec<_> = err
        .backtrace
        .as_ref()
        .unwrap()
        .frames()
        .iter()
        .map(|f| f.name.clone())
        .collect();
    assert_eq!(frames, vec!["explode".to_string(), task.clone()]);
}
