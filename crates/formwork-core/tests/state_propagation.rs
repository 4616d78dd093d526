//! State propagation: validity, dirtiness, enablement, overrides

use formwork_core::prelude::*;
use formwork_resolver::Expr;
use serde_json::json;

#[tokio::test]
async fn required_failure_surfaces_and_blocks_the_root() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("a").with_initial_value(json!("x")),
            Field::new("b").with_validation("required", true),
        ]))
        .unwrap();

    // b has no value, so the aggregate omits it.
    assert_eq!(form.value(), Some(json!({"a": "x"})));
    assert!(!form.state().valid);

    let valid = form.validate(false).await;
    assert!(!valid);

    let b = form.get_control("b").unwrap();
    assert!(b.state().validated);
    assert!(!b.state().valid);
    assert!(b.state().errors.contains_key("required"));
    assert!(!form.state().valid);

    // The failing child appears path-qualified in the root's error set.
    let all = form.state().all_errors;
    assert!(all.iter().any(|entry| entry.path == "b"));
}

#[tokio::test]
async fn validity_failure_propagates_to_the_root() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("top").with_fields(vec![
            Field::new("mid").with_fields(vec![
                Field::new("leaf").with_validation("required", true),
            ]),
        ]))
        .unwrap();

    assert!(!form.validate(false).await);
    let mid = form.get_control("mid").unwrap();
    let leaf = form.get_control("mid.leaf").unwrap();
    // The leaf's own validator fails; everything above inherits invalidity
    // without any own validator failures.
    assert!(!leaf.state().valid);
    assert!(mid.state().errors.is_empty());
    assert!(!mid.state().valid);
    assert!(!form.state().valid);

    leaf.set_value(json!("present")).unwrap();
    assert!(form.validate(false).await);
    assert!(form.state().valid);
}

#[tokio::test]
async fn inactive_children_never_block_parent_validity() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("ok").with_initial_value(json!(1)),
            Field::new("broken").with_validation("required", true),
        ]))
        .unwrap();

    assert!(!form.validate(false).await);

    form.get_control("broken").unwrap().set_active(false);
    assert!(form.validate(false).await);
    assert!(form.state().valid);
}

#[tokio::test]
async fn dirty_marks_every_ancestor() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("top").with_fields(vec![
            Field::new("mid").with_fields(vec![Field::new("leaf")]),
        ]))
        .unwrap();

    let leaf = form.get_control("mid.leaf").unwrap();
    assert!(form.state().pristine());

    leaf.set_dirty(true);
    assert!(leaf.state().dirty);
    assert!(form.get_control("mid").unwrap().state().dirty);
    assert!(form.state().dirty);
}

#[tokio::test]
async fn disabling_cascades_to_every_child() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("group").with_fields(vec![Field::new("leaf")]),
        ]))
        .unwrap();

    form.set_enabled(false);
    assert!(form.state().disabled());
    assert!(form.get_control("group").unwrap().state().disabled());
    assert!(form.get_control("group.leaf").unwrap().state().disabled());

    form.set_enabled(true);
    assert!(form.get_control("group.leaf").unwrap().state().enabled);
}

#[tokio::test]
async fn literal_state_override_deactivates_a_child() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("shown").with_initial_value(json!(1)),
            Field::new("hidden")
                .with_initial_value(json!(2))
                .with_state_override("active", Expr::literal(json!(false))),
        ]))
        .unwrap();

    assert!(!form.get_control("hidden").unwrap().state().active);
    assert_eq!(form.value(), Some(json!({"shown": 1})));
}

#[tokio::test]
async fn resolver_backed_state_override() {
    let context = FormContext::new();
    context.register_resolver(
        "is-even",
        std::sync::Arc::new(|ctx| {
            let even = ctx
                .value
                .as_ref()
                .and_then(Value::as_i64)
                .is_some_and(|n| n % 2 == 0);
            SlotOutput::ready(json!(even))
        }),
    );

    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("number")
                .with_initial_value(json!(3))
                .with_state_override("visible", Expr::from(json!("$$is-even"))),
        ]))
        .unwrap();

    // 3 is odd: the resolver returns false, the control hides.
    assert!(form.get_control("number").unwrap().state().hidden());
}

#[tokio::test]
async fn validate_marks_touched_on_request() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("x").with_validation("required", true),
        ]))
        .unwrap();

    assert!(form.state().untouched());
    form.validate(true).await;
    assert!(form.state().touched);
}

#[tokio::test]
async fn should_show_error_requires_validation_and_interaction() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("x").with_validation("required", true),
        ]))
        .unwrap();

    let x = form.get_control("x").unwrap();
    assert!(!x.should_show_error());

    x.validate(false).await;
    // Invalid but not interacted with yet.
    assert!(!x.should_show_error());

    x.set_touched(true);
    assert!(x.should_show_error());

    // Manual override wins over the derived policy.
    x.set_should_show_error(false);
    assert!(!x.should_show_error());
}

#[tokio::test]
async fn nearer_validator_registration_wins() {
    let context = FormContext::new();
    context.register_validator(
        "flavored",
        std::sync::Arc::new(|_ctx| {
            SlotOutput::ready(json!({"valid": false, "error": "from context"}))
        }),
    );

    let form = context
        .create_form(
            Field::new("root").with_fields(vec![Field::new("x")
                .with_validation("flavored", true)
                .with_validator(
                    "flavored",
                    std::sync::Arc::new(|_ctx| {
                        SlotOutput::ready(json!({"valid": false, "error": "from field"}))
                    }),
                )]),
        )
        .unwrap();

    form.validate(false).await;
    let errors = form.get_control("x").unwrap().state().errors;
    assert_eq!(errors.get("flavored").map(String::as_str), Some("from field"));
}

#[tokio::test]
async fn async_validator_completes_through_validate() {
    let context = FormContext::new();
    context.register_validator(
        "slow-reject",
        std::sync::Arc::new(|_ctx| {
            SlotOutput::deferred(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                json!({"valid": false, "error": "checked remotely"})
            })
        }),
    );

    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("x").with_validation("slow-reject", true),
        ]))
        .unwrap();

    assert!(!form.validate(false).await);
    let errors = form.get_control("x").unwrap().state().errors;
    assert_eq!(
        errors.get("slow-reject").map(String::as_str),
        Some("checked remotely")
    );
}
