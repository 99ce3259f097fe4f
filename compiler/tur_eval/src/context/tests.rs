use super::*;
use crate::errors::EvalErrorKind;
use pretty_assertions::assert_eq;

fn name(text: &str) -> Name {
    Name::new(text)
}

mod binding_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn define_then_get() {
        let ctx = Context::new();
        ctx.define(name("x"), Value::Int(1), Vec::new()).unwrap();
        assert_eq!(ctx.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn define_twice_fails() {
        let ctx = Context::new();
        ctx.define(name("x"), Value::Int(1), Vec::new()).unwrap();
        let err = ctx.define(name("x"), Value::Int(2), Vec::new()).unwrap_err();
        assert_eq!(
            err.kind,
            EvalErrorKind::AlreadyDefined {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn define_checks_declared_types() {
        let ctx = Context::new();
        let err = ctx
            .define(name("x"), Value::string("s"), vec![name("num")])
            .unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
        assert!(!ctx.contains_frame("x"));
    }

    #[test]
    fn get_walks_the_parent_chain() {
        let root = Context::new();
        root.local(name("x"), Value::Int(1)).unwrap();
        let child = root.wrap().wrap();
        assert_eq!(child.get("x").unwrap(), Value::Int(1));
        assert!(child.contains_local("x"));
        assert!(!child.contains_frame("x"));
    }

    #[test]
    fn undefined_name_fails() {
        let err = Context::new().get("nope").unwrap_err();
        assert_eq!(
            err.kind,
            EvalErrorKind::UndefinedVariable {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn child_shadows_parent() {
        let root = Context::new();
        root.local(name("x"), Value::Int(1)).unwrap();
        let child = root.wrap();
        child.local(name("x"), Value::Int(2)).unwrap();
        assert_eq!(child.get("x").unwrap(), Value::Int(2));
        assert_eq!(root.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn unlet_removes_only_local_bindings() {
        let root = Context::new();
        root.local(name("x"), Value::Int(1)).unwrap();
        let child = root.wrap();
        assert!(matches!(
            child.unlet("x").unwrap_err().kind,
            EvalErrorKind::NotLocal { .. }
        ));
        root.unlet("x").unwrap();
        assert!(!root.contains("x"));
        assert!(root.keys().is_empty());
    }

    #[test]
    fn keys_keep_definition_order() {
        let ctx = Context::new();
        for n in ["c", "a", "b"] {
            ctx.local(name(n), Value::None).unwrap();
        }
        assert_eq!(ctx.keys(), vec![name("c"), name("a"), name("b")]);
    }

    #[test]
    fn all_local_keys_lists_nearest_first_once() {
        let root = Context::new();
        root.local(name("a"), Value::Int(1)).unwrap();
        root.local(name("b"), Value::Int(1)).unwrap();
        let child = root.wrap();
        child.local(name("b"), Value::Int(2)).unwrap();
        child.local(name("c"), Value::Int(2)).unwrap();
        assert_eq!(
            child.all_local_keys(),
            vec![name("b"), name("c"), name("a")]
        );
    }
}

mod freeze_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn update_of_frozen_fails_but_force_succeeds() {
        let ctx = Context::new();
        ctx.local(name("s"), Value::Int(1)).unwrap();
        ctx.freeze("s").unwrap();

        let err = ctx.update("s", Value::Int(2)).unwrap_err();
        assert_eq!(
            err.kind,
            EvalErrorKind::FrozenVariableAssignment {
                name: "s".to_string()
            }
        );
        assert_eq!(ctx.get("s").unwrap(), Value::Int(1));

        ctx.force_update("s", Value::Int(3)).unwrap();
        assert_eq!(ctx.get("s").unwrap(), Value::Int(3));
        assert!(ctx.is_frozen("s"));
    }

    #[test]
    fn freeze_twice_fails() {
        let ctx = Context::new();
        ctx.local(name("s"), Value::Int(1)).unwrap();
        ctx.freeze("s").unwrap();
        assert!(matches!(
            ctx.freeze("s").unwrap_err().kind,
            EvalErrorKind::AlreadyFrozen { .. }
        ));
    }

    #[test]
    fn freeze_applies_to_the_nearest_binding() {
        let root = Context::new();
        root.local(name("x"), Value::Int(1)).unwrap();
        let child = root.wrap();
        child.freeze("x").unwrap();
        assert!(root.is_frozen("x"));
        assert!(root.update("x", Value::Int(5)).is_err());
    }

    #[test]
    fn local_on_frozen_binding_fails() {
        let ctx = Context::new();
        ctx.local(name("x"), Value::Int(1)).unwrap();
        ctx.freeze("x").unwrap();
        assert!(ctx.local(name("x"), Value::Int(2)).is_err());
    }

    #[test]
    fn update_goes_to_the_defining_scope() {
        let root = Context::new();
        root.local(name("x"), Value::Int(1)).unwrap();
        root.wrap().update("x", Value::Int(7)).unwrap();
        assert_eq!(root.get("x").unwrap(), Value::Int(7));
    }
}

mod global_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn globals_are_visible_from_any_scope_sharing_the_table() {
        let root = Context::new();
        root.global_with(name("g"), Value::Int(1)).unwrap();
        let task_root = root.thread();
        assert_eq!(task_root.get("g").unwrap(), Value::Int(1));
        assert!(task_root.get_local("g").is_none());
    }

    #[test]
    fn declared_global_updates_the_table() {
        let root = Context::new();
        root.global_with(name("g"), Value::Int(1)).unwrap();
        let inner = root.wrap();
        inner.global(name("g")).unwrap();
        inner.update("g", Value::Int(2)).unwrap();
        assert_eq!(root.thread().get("g").unwrap(), Value::Int(2));
    }

    #[test]
    fn global_conflicting_with_local_fails() {
        let ctx = Context::new();
        ctx.local(name("x"), Value::Int(1)).unwrap();
        assert!(ctx.global(name("x")).is_err());
    }
}

mod caller_tests {
    use super::*;

    #[test]
    fn caller_is_found_through_parents() {
        let caller = Context::new();
        let callee = Context::new();
        callee.set_caller(&caller);
        let inner = callee.wrap();
        assert!(inner.caller().unwrap().ptr_eq(&caller));
    }

    #[test]
    fn caller_link_does_not_keep_the_caller_alive() {
        let callee = Context::new();
        {
            let caller = Context::new();
            callee.set_caller(&caller);
        }
        assert!(callee.caller().is_none());
    }
}

mod snapshot_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_is_frozen_and_independent() {
        let root = Context::new();
        root.local(name("s"), Value::Int(1)).unwrap();
        let snap = root.snapshot();

        assert!(snap.is_frozen("s"));
        assert!(snap.update("s", Value::Int(2)).is_err());

        root.update("s", Value::Int(5)).unwrap();
        assert_eq!(snap.get("s").unwrap(), Value::Int(1));
        assert!(!root.is_frozen("s"));
    }

    #[test]
    fn snapshot_takes_the_nearest_binding() {
        let root = Context::new();
        root.local(name("x"), Value::Int(1)).unwrap();
        let child = root.wrap();
        child.local(name("x"), Value::Int(2)).unwrap();
        assert_eq!(child.snapshot().get("x").unwrap(), Value::Int(2));
    }

    #[test]
    fn snapshot_inherits_print_target() {
        let root = Context::new();
        root.set_print_target(crate::print_handler::buffer_handler());
        assert!(root.wrap().snapshot().print_target().is_some());
    }

    #[test]
    fn merge_skips_excluded_names() {
        let target = Context::new();
        let source = Context::new();
        source.local(name("a"), Value::Int(1)).unwrap();
        source.local(name("this"), Value::None).unwrap();
        target.merge_from(&source, &["this"]).unwrap();
        assert_eq!(target.keys(), vec![name("a")]);
    }
}

#[test]
fn export_list_has_no_duplicates() {
    let ctx = Context::new();
    ctx.add_export(name("a"));
    ctx.add_export(name("b"));
    ctx.add_export(name("a"));
    assert_eq!(ctx.exporting(), vec![name("a"), name("b")]);
}

#[test]
fn open_exposes_local_bindings_as_fields() {
    use crate::value::FieldProvider;

    let ctx = Context::new();
    ctx.local(name("x"), Value::Int(4)).unwrap();
    let Value::Object(obj) = ctx.open() else {
        panic!("open() must produce an object");
    };
    assert_eq!(obj.get_field("x"), Some(Value::Int(4)));
    assert_eq!(obj.fields(), vec![name("x")]);
}
