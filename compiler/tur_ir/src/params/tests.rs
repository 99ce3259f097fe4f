use super::*;
use pretty_assertions::assert_eq;

#[test]
fn simple_list_keeps_order() {
    let list = ParameterList::simple(["a", "b", "c"]).unwrap();
    let names: Vec<&str> = list.parameters().iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(list.len(), 3);
    assert!(list.rest().is_none());
}

#[test]
fn duplicate_parameter_rejected() {
    let err = ParameterList::simple(["a", "a"]).unwrap_err();
    assert_eq!(err, ParamError::Duplicate(Name::new("a")));
}

#[test]
fn collector_clashing_with_parameter_rejected() {
    let err = ParameterList::new(
        vec![Parameter::new("a"), Parameter::new("rest")],
        Some(Name::new("rest")),
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "parameter 'rest' is declared more than once");
}

#[test]
fn meta_and_closure_must_differ() {
    let result = ParameterList::new(
        vec![],
        None,
        Some(Name::new("x")),
        Some(Name::new("x")),
    );
    assert!(result.is_err());
}

#[test]
fn defaults_iterates_only_present_defaults() {
    let list = ParameterList::new(
        vec![
            Parameter::new("a"),
            Parameter::new("b").with_default(Command::int(2)),
        ],
        None,
        None,
        None,
    )
    .unwrap();
    assert_eq!(list.defaults().count(), 1);
}

#[test]
fn named_only_does_not_accept_positional() {
    assert!(!ParamKind::NamedOnly.accepts_positional());
    assert!(ParamKind::PositionalOnly.accepts_positional());
    assert!(ParamKind::PositionalOrNamed.accepts_positional());
}
