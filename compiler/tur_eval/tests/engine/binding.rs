//! Argument binding through real calls.

use pretty_assertions::assert_eq;
use tur_eval::{EvalErrorKind, Value};
use tur_ir::{Argument, BinaryOp, Command, FunctionDef, Name, Parameter, ParameterList};

use crate::common::{call, eval, function, names};

/// `fn f(a, b = 2, [rest], {meta}) { [a, b, rest, meta] }`
fn collector() -> Command {
    let params = ParameterList::new(
        vec![
            Parameter::new("a"),
            Parameter::new("b").with_default(Command::int(2)),
        ],
        Some(Name::new("rest")),
        Some(Name::new("meta")),
        None,
    )
    .unwrap();
    let body = Command::List(
        ["a", "b", "rest", "meta"]
            .into_iter()
            .map(Command::ident)
            .collect(),
    );
    function("f", params, body)
}

/// The bound `a`, `b`, `rest` and the `meta` fields with their values.
fn bound(value: Value) -> (Value, Value, Value, Vec<(Name, Value)>) {
    let Value::List(items) = value else {
        panic!("expected a list, got {value:?}");
    };
    let meta = items[3].as_field_provider().unwrap();
    let fields = meta
        .fields()
        .into_iter()
        .map(|name| {
            let value = meta.get_field(name.as_str()).unwrap();
            (name, value)
        })
        .collect();
    (items[0].clone(), items[1].clone(), items[2].clone(), fields)
}

fn call_collector(args: Vec<Argument>) -> Value {
    eval(vec![
        collector(),
        Command::call(Command::ident("f"), args),
    ])
    .unwrap()
}

#[test]
fn defaults_fill_missing_arguments() {
    let (a, b, rest, meta) = bound(call_collector(vec![Argument::positional(Command::int(1))]));
    assert_eq!(a, Value::Int(1));
    assert_eq!(b, Value::Int(2));
    assert_eq!(rest, Value::list(Vec::new()));
    assert!(meta.is_empty());
}

#[test]
fn extra_arguments_go_to_rest_and_meta() {
    let (a, b, rest, meta) = bound(call_collector(vec![
        Argument::positional(Command::int(1)),
        Argument::positional(Command::int(2)),
        Argument::positional(Command::int(3)),
        Argument::named("x", Command::int(4)),
    ]));
    assert_eq!(a, Value::Int(1));
    assert_eq!(b, Value::Int(2));
    assert_eq!(rest, Value::list(vec![Value::Int(3)]));
    assert_eq!(meta, vec![(Name::new("x"), Value::Int(4))]);
}

#[test]
fn named_argument_fills_its_parameter() {
    let (a, b, _, meta) = bound(call_collector(vec![Argument::named("a", Command::int(5))]));
    assert_eq!(a, Value::Int(5));
    assert_eq!(b, Value::Int(2));
    assert!(meta.is_empty());
}

#[test]
fn spread_list_feeds_positionals() {
    let (a, b, rest, _) = bound(call_collector(vec![Argument::spread(Command::List(vec![
        Command::int(7),
        Command::int(8),
        Command::int(9),
    ]))]));
    assert_eq!(a, Value::Int(7));
    assert_eq!(b, Value::Int(8));
    assert_eq!(rest, Value::list(vec![Value::Int(9)]));
}

#[test]
fn defaults_are_evaluated_where_the_call_is_made() {
    // let base = 1; fn g(v = base) { v }; { let base = 2; g() }
    let params = ParameterList::new(
        vec![Parameter::new("v").with_default(Command::ident("base"))],
        None,
        None,
        None,
    )
    .unwrap();
    let value = eval(vec![
        Command::let_("base", Command::int(1)),
        function("g", params, Command::ident("v")),
        Command::Block(vec![
            Command::let_("base", Command::int(2)),
            call("g", Vec::new()),
        ]),
    ]);
    assert_eq!(value.unwrap(), Value::Int(2));
}

#[test]
fn trailing_argument_becomes_the_closure() {
    // fn apply(x, closure) { closure(x) }; apply(4, fn(y) { y * 3 })
    let params = ParameterList::new(vec![Parameter::new("x")], None, None, Some(Name::new("closure")))
        .unwrap();
    let tripler = Command::function(FunctionDef::closure(
        None,
        ParameterList::simple(["y"]).unwrap(),
        Command::binary(BinaryOp::Mul, Command::ident("y"), Command::int(3)),
    ));
    let value = eval(vec![
        function("apply", params, call("closure", vec![Command::ident("x")])),
        call("apply", vec![Command::int(4), tripler]),
    ]);
    assert_eq!(value.unwrap(), Value::Int(12));
}

#[test]
fn binding_errors() {
    let two = || ParameterList::simple(["a", "b"]).unwrap();
    let body = || Command::ident("a");

    let err = eval(vec![
        function("f", two(), body()),
        call("f", vec![Command::int(1), Command::int(2), Command::int(3)]),
    ])
    .unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::TooManyArguments);

    let err = eval(vec![
        function("f", two(), body()),
        call("f", vec![Command::int(1)]),
    ])
    .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::MissingArgument {
            name: "b".to_string()
        }
    );

    let err = eval(vec![
        function("f", two(), body()),
        Command::call(
            Command::ident("f"),
            vec![
                Argument::positional(Command::int(1)),
                Argument::named("a", Command::int(2)),
            ],
        ),
    ])
    .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::DuplicateArgument {
            name: "a".to_string()
        }
    );
}

#[test]
fn parameter_types_are_enforced() {
    let params = ParameterList::new(
        vec![Parameter::new("n").with_types(names(&["num"]))],
        None,
        None,
        None,
    )
    .unwrap();
    let err = eval(vec![
        function("f", params, Command::ident("n")),
        call("f", vec![Command::string("seven")]),
    ])
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}
