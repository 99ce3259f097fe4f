//! Currying, chaining, macros and reclosing through the built-ins.

use pretty_assertions::assert_eq;
use tur_eval::{EvalErrorKind, Value};
use tur_ir::{BinaryOp, Command, FunctionDef, Name, ParameterList};

use crate::common::{call, eval, function};

/// `fn f(a, b) { a * 10 + b }`
fn two_digit() -> Command {
    function(
        "f",
        ParameterList::simple(["a", "b"]).unwrap(),
        Command::binary(
            BinaryOp::Add,
            Command::binary(BinaryOp::Mul, Command::ident("a"), Command::int(10)),
            Command::ident("b"),
        ),
    )
}

fn unary(name: &str, op: BinaryOp, operand: i64) -> Command {
    function(
        name,
        ParameterList::simple(["x"]).unwrap(),
        Command::binary(op, Command::ident("x"), Command::int(operand)),
    )
}

#[test]
fn curry_matches_the_full_call() {
    let value = eval(vec![
        two_digit(),
        Command::let_(
            "g",
            call(
                "curry",
                vec![Command::ident("f"), Command::List(vec![Command::int(1)])],
            ),
        ),
        Command::List(vec![
            call("g", vec![Command::int(2)]),
            call("f", vec![Command::int(1), Command::int(2)]),
            call("curried_arity", vec![Command::ident("g")]),
            call("is_curried", vec![Command::ident("g")]),
        ]),
    ]);
    assert_eq!(
        value.unwrap(),
        Value::list(vec![
            Value::Int(12),
            Value::Int(12),
            Value::Int(1),
            Value::Bool(true),
        ])
    );
}

#[test]
fn uncurry_restores_both_arguments() {
    let value = eval(vec![
        two_digit(),
        Command::let_(
            "g",
            call(
                "curry",
                vec![Command::ident("f"), Command::List(vec![Command::int(1)])],
            ),
        ),
        Command::let_("h", call("uncurry", vec![Command::ident("g")])),
        Command::List(vec![
            call("h", vec![Command::int(3), Command::int(4)]),
            call("is_curried", vec![Command::ident("h")]),
        ]),
    ]);
    assert_eq!(
        value.unwrap(),
        Value::list(vec![Value::Int(34), Value::Bool(false)])
    );
}

#[test]
fn uncurrying_a_plain_function_fails() {
    let err = eval(vec![two_digit(), call("uncurry", vec![Command::ident("f")])]).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::NotCurried {
            name: "f".to_string()
        }
    );
}

#[test]
fn chain_feeds_the_first_result_to_the_second() {
    let value = eval(vec![
        unary("inc", BinaryOp::Add, 1),
        unary("double", BinaryOp::Mul, 2),
        Command::let_(
            "both",
            Command::Chain {
                first: Box::new(Command::ident("inc")),
                second: Box::new(Command::ident("double")),
            },
        ),
        call("both", vec![Command::int(3)]),
    ]);
    assert_eq!(value.unwrap(), Value::Int(8));
}

#[test]
fn macro_evaluates_its_argument_on_demand() {
    // macro twice(x) { evaluate(x); evaluate(x) }
    let twice = Command::function(FunctionDef::macro_def(
        Some(Name::new("twice")),
        ParameterList::simple(["x"]).unwrap(),
        Command::Block(vec![
            call("evaluate", vec![Command::ident("x")]),
            call("evaluate", vec![Command::ident("x")]),
        ]),
    ));
    let bump = Command::assign(
        "hits",
        Command::binary(BinaryOp::Add, Command::ident("hits"), Command::int(1)),
    );
    let value = eval(vec![
        Command::let_("hits", Command::int(0)),
        twice,
        call("twice", vec![bump]),
        Command::ident("hits"),
    ]);
    assert_eq!(value.unwrap(), Value::Int(2));
}

#[test]
fn reclose_rebinds_the_captured_scope() {
    // let f = fn() { secret }; { let secret = 5; reclose(f)() }
    let reader = Command::function(FunctionDef::closure(
        None,
        ParameterList::default(),
        Command::ident("secret"),
    ));
    let value = eval(vec![
        Command::let_("f", reader),
        Command::Block(vec![
            Command::let_("secret", Command::int(5)),
            Command::call(call("reclose", vec![Command::ident("f")]), Vec::new()),
        ]),
    ]);
    assert_eq!(value.unwrap(), Value::Int(5));

    let err = eval(vec![
        Command::let_(
            "f",
            Command::function(FunctionDef::closure(
                None,
                ParameterList::default(),
                Command::ident("secret"),
            )),
        ),
        Command::Block(vec![
            Command::let_("secret", Command::int(5)),
            call("f", Vec::new()),
        ]),
    ])
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UndefinedVariable { .. }));
}
