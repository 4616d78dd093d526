//! Submit lifecycle

use formwork_core::prelude::*;
use futures::FutureExt;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_handler(calls: Arc<AtomicUsize>) -> formwork_core::SubmitFn {
    Arc::new(move |_ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { SubmitOutcome::Success(None) }.boxed()
    })
}

#[tokio::test]
async fn invalid_form_runs_the_invalid_branch_only() {
    let valid_calls = Arc::new(AtomicUsize::new(0));
    let invalid_calls = Arc::new(AtomicUsize::new(0));

    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("guarded")
                .with_fields(vec![Field::new("req").with_validation("required", true)])
                .with_submit_handler(SubmitHandler::Branch {
                    valid: Some(counting_handler(valid_calls.clone())),
                    invalid: Some(counting_handler(invalid_calls.clone())),
                }),
        )
        .unwrap();

    let result = form.submit().await.unwrap();
    assert_eq!(result, SubmitResult::FormInvalid);
    assert_eq!(valid_calls.load(Ordering::SeqCst), 0);
    assert_eq!(invalid_calls.load(Ordering::SeqCst), 1);

    let state = form.state();
    assert_eq!(state.submit_result, SubmitResult::FormInvalid);
    assert_eq!(state.submits, 1);
    assert!(!state.submitting);
    assert!(state.submitted);
}

#[tokio::test]
async fn successful_submit_disables_by_default() {
    let calls = Arc::new(AtomicUsize::new(0));
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("simple")
                .with_fields(vec![Field::new("a").with_initial_value(json!(1))])
                .with_submit_handler(SubmitHandler::Function(counting_handler(calls.clone()))),
        )
        .unwrap();

    let result = form.submit().await.unwrap();
    assert_eq!(result, SubmitResult::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let state = form.state();
    assert_eq!(state.submit_result, SubmitResult::Success);
    assert_eq!(state.submits, 1);
    // Post-success policy defaults to leaving the form disabled.
    assert!(state.disabled());
}

#[tokio::test]
async fn successful_submit_can_reenable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("reusable")
                .with_fields(vec![Field::new("a").with_initial_value(json!(1))])
                .with_config(FieldConfig::new().with_successful_submit(AfterSubmit::Enable))
                .with_submit_handler(SubmitHandler::Function(counting_handler(calls.clone()))),
        )
        .unwrap();

    form.submit().await.unwrap();
    assert!(form.state().enabled);

    form.submit().await.unwrap();
    assert_eq!(form.state().submits, 2);
}

#[tokio::test]
async fn failure_sentinel_is_a_recoverable_error() {
    let context = FormContext::new();
    let handler: formwork_core::SubmitFn = Arc::new(|_ctx| {
        async { SubmitOutcome::Failure(Some(json!({"reason": "backend said no"}))) }.boxed()
    });
    let form = context
        .create_form(
            Field::new("flaky")
                .with_fields(vec![Field::new("a").with_initial_value(json!(1))])
                .with_submit_handler(SubmitHandler::Function(handler)),
        )
        .unwrap();

    let result = form.submit().await.unwrap();
    assert_eq!(result, SubmitResult::Error);

    let state = form.state();
    assert_eq!(state.submit_result, SubmitResult::Error);
    // Left enabled for retry.
    assert!(state.enabled);
    assert_eq!(state.submits, 1);
}

#[tokio::test]
async fn missing_handler_refuses_the_call() {
    let context = FormContext::new();
    let form = context
        .create_form(Field::new("bare").with_fields(vec![
            Field::new("a").with_initial_value(json!(1)),
        ]))
        .unwrap();

    let result = form.submit().await;
    assert!(matches!(result, Err(SubmitError::NoHandler { .. })));
    // A refused call does not count as an attempt.
    assert_eq!(form.state().submits, 0);
}

#[tokio::test]
async fn allow_invalid_submit_runs_the_valid_handler_anyway() {
    let calls = Arc::new(AtomicUsize::new(0));
    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("permissive")
                .with_fields(vec![Field::new("req").with_validation("required", true)])
                .with_config(FieldConfig::new().with_invalid_submit())
                .with_submit_handler(SubmitHandler::Function(counting_handler(calls.clone()))),
        )
        .unwrap();

    let result = form.submit().await.unwrap();
    assert_eq!(result, SubmitResult::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn before_and_after_submit_hooks_run_across_the_tree() {
    let order: Arc<parking_lot::Mutex<Vec<&'static str>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));

    let before = {
        let order = order.clone();
        Arc::new(move |_control: &Arc<Control>| {
            let order = order.clone();
            async move {
                order.lock().push("before");
            }
            .boxed()
        })
    };
    let after = {
        let order = order.clone();
        Arc::new(move |_control: &Arc<Control>| {
            let order = order.clone();
            async move {
                order.lock().push("after");
            }
            .boxed()
        })
    };

    let handler: formwork_core::SubmitFn = {
        let order = order.clone();
        Arc::new(move |_ctx| {
            let order = order.clone();
            async move {
                order.lock().push("handler");
                SubmitOutcome::Success(None)
            }
            .boxed()
        })
    };

    let mut child = Field::new("a").with_initial_value(json!(1));
    child.hooks.on_before_submit = Some(before);
    child.hooks.on_after_submit = Some(after);

    let context = FormContext::new();
    let form = context
        .create_form(
            Field::new("hooked")
                .with_fields(vec![child])
                .with_submit_handler(SubmitHandler::Function(handler)),
        )
        .unwrap();

    form.submit().await.unwrap();
    assert_eq!(*order.lock(), vec!["before", "handler", "after"]);
}
