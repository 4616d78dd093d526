//! Value synchronization: aggregation, reconciliation, and repeating controls

use formwork_core::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn group_form(context: &std::sync::Arc<FormContext>) -> std::sync::Arc<Control> {
    context
        .create_form(Field::new("pair").with_fields(vec![Field::new("a"), Field::new("b")]))
        .expect("form builds")
}

#[tokio::test]
async fn group_set_value_round_trips() {
    let context = FormContext::new();
    let form = group_form(&context);

    form.set_value(json!({"a": 1, "b": 2})).unwrap();
    assert_eq!(form.value(), Some(json!({"a": 1, "b": 2})));
    assert_eq!(form.get_control("a").unwrap().value(), Some(json!(1)));
    assert_eq!(form.get_control("b").unwrap().value(), Some(json!(2)));
}

#[tokio::test]
async fn inactive_children_drop_out_of_the_aggregate() {
    let context = FormContext::new();
    let form = group_form(&context);
    form.set_value(json!({"a": 1, "b": 2})).unwrap();

    let b = form.get_control("b").unwrap();
    b.set_active(false);

    assert_eq!(form.value(), Some(json!({"a": 1})));
    // The excluded child still holds its value internally.
    assert_eq!(b.value(), Some(json!(2)));

    b.set_active(true);
    assert_eq!(form.value(), Some(json!({"a": 1, "b": 2})));
}

#[tokio::test]
async fn replace_semantics_clear_absent_keys_patch_keeps_them() {
    let context = FormContext::new();
    let form = group_form(&context);
    form.set_value(json!({"a": 1, "b": 2})).unwrap();

    form.set_value(json!({"a": 10})).unwrap();
    assert_eq!(form.value(), Some(json!({"a": 10})));

    form.patch_value(json!({"b": 20})).unwrap();
    assert_eq!(form.value(), Some(json!({"a": 10, "b": 20})));
}

#[tokio::test]
async fn child_value_bubbles_to_the_root() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("nested").with_fields(vec![
            Field::new("outer").with_fields(vec![Field::new("inner")]),
        ]))
        .unwrap();

    let inner = form.get_control("outer.inner").unwrap();
    inner.set_value(json!("deep")).unwrap();
    assert_eq!(form.value(), Some(json!({"outer": {"inner": "deep"}})));
}

#[tokio::test]
async fn clearing_a_group_keeps_declared_children() {
    let context = FormContext::new();
    let form = group_form(&context);
    form.set_value(json!({"a": 1, "b": 2})).unwrap();

    form.clear_value().unwrap();
    assert_eq!(form.controls().len(), 2);
    assert_eq!(form.get_control("a").unwrap().value(), None);
}

#[tokio::test]
async fn initial_values_populate_children_before_defaults() {
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("seeded")
                .with_initial_value(json!({"a": "inherited"}))
                .with_fields(vec![
                    Field::new("a").with_default_value(json!("default")),
                    Field::new("b").with_default_value(json!("fallback")),
                ]),
        )
        .unwrap();

    // The parent's supplied object wins over the child's own default.
    assert_eq!(form.get_control("a").unwrap().value(), Some(json!("inherited")));
    assert_eq!(form.get_control("b").unwrap().value(), Some(json!("fallback")));
}

#[tokio::test]
async fn start_with_materializes_repeating_children() {
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("list")
                .with_grouping(Grouping::Array)
                .with_fields(vec![
                    Field::new("item").with_fields(vec![Field::new("title")]),
                ])
                .with_start_with(StartWith::Count(2)),
        )
        .unwrap();

    assert_eq!(form.controls().len(), 2);
    for child in form.controls() {
        assert_eq!(child.controls().len(), 1);
        assert_eq!(child.controls()[0].name(), "title");
    }
    let value = form.value().expect("array value");
    assert_eq!(value.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn append_and_remove_repeating_controls_reindex() {
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("list")
                .with_grouping(Grouping::Array)
                .with_fields(vec![
                    Field::new("item").with_fields(vec![Field::new("title")]),
                ])
                .with_start_with(StartWith::Count(2)),
        )
        .unwrap();

    // No explicit template: the sole declared template is used.
    form.append_repeating_control(None).unwrap();
    assert_eq!(form.value().unwrap().as_array().map(Vec::len), Some(3));

    let second = form.get_control(1isize).unwrap();
    let second_key = second.key();
    assert!(second.remove());
    assert_eq!(form.controls().len(), 2);
    assert_eq!(form.value().unwrap().as_array().map(Vec::len), Some(2));

    // The control that moved into index 1 takes over the structural key.
    let shifted = form.get_control(1isize).unwrap();
    assert_eq!(shifted.key(), second_key);
}

#[tokio::test]
async fn array_reconciliation_identifies_entries_by_name_metadata() {
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("items")
                .with_grouping(Grouping::Array)
                .with_config(FieldConfig::new().with_metadata())
                .with_fields(vec![
                    Field::new("x").with_fields(vec![Field::new("vx")]),
                    Field::new("y").with_fields(vec![Field::new("vy")]),
                ]),
        )
        .unwrap();

    form.set_value(json!([
        {"_name": "x", "vx": 1},
        {"_name": "y", "vy": 2},
    ]))
    .unwrap();

    let children = form.controls();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].name(), "x");
    assert_eq!(children[1].name(), "y");

    let value = form.value().unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries[0].get("_name"), Some(&json!("x")));
    assert_eq!(entries[0].get("vx"), Some(&json!(1)));
    assert_eq!(entries[1].get("_name"), Some(&json!("y")));
    assert_eq!(entries[1].get("vy"), Some(&json!(2)));
}

#[tokio::test]
async fn heterogeneous_array_without_metadata_is_a_construction_error() {
    let context = FormContext::new();
    let result = context.create_form(
        Field::new("items")
            .with_grouping(Grouping::Array)
            .with_fields(vec![
                Field::new("x").with_fields(vec![Field::new("vx")]),
                Field::new("y").with_fields(vec![Field::new("vy")]),
            ]),
    );
    assert!(matches!(
        result,
        Err(FieldError::HeterogeneousWithoutMetadata { .. })
    ));
}

#[tokio::test]
async fn duplicate_sibling_names_are_a_construction_error() {
    let context = FormContext::new();
    let result = context.create_form(
        Field::new("dupes").with_fields(vec![Field::new("a"), Field::new("a")]),
    );
    assert!(matches!(result, Err(FieldError::DuplicateNames { names, .. }) if names == ["a"]));
}

#[tokio::test]
async fn set_field_with_equal_descriptor_is_a_noop() {
    let context = FormContext::new();
    let field = Field::new("stable").with_fields(vec![Field::new("a")]);
    let form = context.create_form(field.clone()).unwrap();

    let child_uid = form.get_control("a").unwrap().uid().clone();
    let revision_before = *form.field_changes().borrow();

    let changed = form.set_field(field, false).unwrap();
    assert!(!changed);
    assert_eq!(*form.field_changes().borrow(), revision_before);
    // Child identity survives.
    assert_eq!(form.get_control("a").unwrap().uid(), &child_uid);
}

#[tokio::test]
async fn moving_a_repeating_control_reorders_the_value() {
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("list")
                .with_grouping(Grouping::Array)
                .with_fields(vec![Field::new("item")]),
        )
        .unwrap();

    form.set_value(json!([1, 2, 3])).unwrap();
    assert_eq!(form.value(), Some(json!([1, 2, 3])));

    assert!(form.move_control(0usize, 2));
    assert_eq!(form.value(), Some(json!([2, 3, 1])));
}

#[tokio::test]
async fn lookup_supports_paths_and_negative_indexes() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("root").with_fields(vec![
            Field::new("group").with_fields(vec![Field::new("leaf")]),
            Field::new("other"),
        ]))
        .unwrap();

    let leaf = form.get_control("group.leaf").unwrap();
    assert_eq!(leaf.name(), "leaf");
    assert_eq!(leaf.get_control(".").map(|c| c.name()), Some("root".to_string()));

    let group = form.get_control("group").unwrap();
    assert_eq!(leaf.get_control("..").map(|c| c.uid().clone()), Some(group.uid().clone()));

    assert_eq!(form.get_control(-1isize).map(|c| c.name()), Some("other".to_string()));
    assert!(form.get_control("missing").is_none());
}

#[tokio::test]
async fn repeated_create_form_returns_the_cached_instance() {
    let context = FormContext::new();
    let first = context
        .create_form(Field::new("cached").with_fields(vec![Field::new("a")]))
        .unwrap();
    let second = context.create_form(Field::new("cached")).unwrap();
    assert_eq!(first.uid(), second.uid());
}

#[tokio::test]
async fn flat_children_splice_into_the_parent_object() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("mixed").with_fields(vec![
            Field::new("plain"),
            Field::new("spliced")
                .with_grouping(Grouping::Flat)
                .with_fields(vec![Field::new("x"), Field::new("y")]),
        ]))
        .unwrap();

    form.get_control("plain").unwrap().set_value(json!(1)).unwrap();
    form.get_control("spliced").unwrap().set_value(json!({"x": 2, "y": 3})).unwrap();

    // Flat grouping merges x/y into the parent without nesting.
    assert_eq!(form.value(), Some(json!({"plain": 1, "x": 2, "y": 3})));
}
