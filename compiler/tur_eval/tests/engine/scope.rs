//! Bindings, freezing and exports.

use pretty_assertions::assert_eq;
use tur_eval::{Context, EvalErrorKind, Value};
use tur_ir::{Command, Name};

use crate::common::{eval, names, run, setup};

#[test]
fn frozen_binding_rejects_update_but_not_force_update() {
    let ctx = Context::new();
    ctx.define(Name::new("x"), Value::Int(1), Vec::new()).unwrap();
    ctx.freeze("x").unwrap();

    let err = ctx.update("x", Value::Int(2)).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::FrozenVariableAssignment {
            name: "x".to_string()
        }
    );
    assert_eq!(ctx.get("x").unwrap(), Value::Int(1));

    ctx.force_update("x", Value::Int(3)).unwrap();
    assert_eq!(ctx.get("x").unwrap(), Value::Int(3));
    assert!(ctx.is_frozen("x"));
}

#[test]
fn pinned_binding_is_frozen_for_nested_blocks() {
    let err = eval(vec![
        Command::let_("limit", Command::int(10)),
        Command::Pin(vec![Name::new("limit")]),
        Command::Block(vec![Command::assign("limit", Command::int(11))]),
    ])
    .unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::FrozenVariableAssignment { .. }
    ));
}

#[test]
fn declared_types_are_checked_on_let() {
    let err = eval(vec![Command::Let {
        name: Name::new("n"),
        types: names(&["num"]),
        value: Box::new(Command::string("ten")),
    }])
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

#[test]
fn undefined_names_fail() {
    let err = eval(vec![Command::ident("ghost")]).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::UndefinedVariable {
            name: "ghost".to_string()
        }
    );
}

#[test]
fn task_contexts_share_only_globals() {
    let (mut interp, ctx) = setup();
    run(
        &mut interp,
        &ctx,
        vec![
            Command::let_("local", Command::int(1)),
            Command::Global {
                name: Name::new("shared"),
                value: Some(Box::new(Command::int(2))),
            },
        ],
    )
    .unwrap();

    let thread = ctx.thread();
    assert!(!thread.contains("local"));
    assert_eq!(thread.get("shared").unwrap(), Value::Int(2));
    assert!(thread.contains("println"));
}

#[test]
fn open_exposes_local_bindings_as_fields() {
    let ctx = Context::new();
    ctx.define(Name::new("a"), Value::Int(1), Vec::new()).unwrap();
    let scope = ctx.wrap();
    scope.define(Name::new("b"), Value::Int(2), Vec::new()).unwrap();

    let opened = scope.open();
    let fields = opened.as_field_provider().unwrap();
    assert_eq!(fields.fields(), names(&["b"]));
    assert_eq!(fields.get_field("b"), Some(Value::Int(2)));
    assert_eq!(fields.get_field("a"), None);
}

#[test]
fn keys_walk_the_parent_chain() {
    let ctx = Context::new();
    ctx.define(Name::new("a"), Value::Int(1), Vec::new()).unwrap();
    let inner = ctx.wrap();
    inner.define(Name::new("b"), Value::Int(2), Vec::new()).unwrap();
    assert_eq!(inner.keys(), names(&["b"]));
    assert_eq!(inner.all_local_keys(), names(&["b", "a"]));
}

#[test]
fn exports_are_collected_per_scope() {
    let (mut interp, ctx) = setup();
    run(
        &mut interp,
        &ctx,
        vec![
            Command::let_("a", Command::int(1)),
            Command::let_("b", Command::int(2)),
            Command::Export(names(&["a", "b", "a"])),
        ],
    )
    .unwrap();
    assert_eq!(ctx.exporting(), names(&["a", "b"]));
}
