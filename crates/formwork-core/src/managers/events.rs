//! Events manager: the submit state machine
//!
//! One submit call runs: full validation → in-flight guard → submitting
//! state (optionally disabling the form) → the valid or invalid branch →
//! post-success policy → counters. Handler failures are caught at the top
//! and reflected as `submit_result = Error`; only the guard conditions
//! ("already submitting", "no handler") surface as errors to the caller.

use super::{ManagerLifecycle, StateManager};
use crate::config::AfterSubmit;
use crate::control::Control;
use crate::error::SubmitError;
use crate::field::{SubmitContext, SubmitFn, SubmitHandler, SubmitOutcome};
use crate::state::{PairState, SubmitResult};
use formwork_resolver::{ResolveContext, SlotOutput};
use formwork_value::Value;
use futures::future::join_all;
use futures::{FutureExt, StreamExt};
use std::sync::{Arc, Weak};

/// Drives the submit lifecycle for one control
pub(crate) struct EventsManager {
    control: Weak<Control>,
}

impl EventsManager {
    pub(crate) fn new(control: Weak<Control>) -> Self {
        Self { control }
    }

    /// Run one submit attempt
    pub(crate) async fn submit(&self) -> Result<SubmitResult, SubmitError> {
        let Some(control) = self.control.upgrade() else {
            return Err(SubmitError::NoHandler { path: ".".to_string() });
        };
        Self::run_submit(control).await
    }

    async fn run_submit(control: Arc<Control>) -> Result<SubmitResult, SubmitError> {
        let config = control.config();

        let valid = StateManager::validate(control.clone(), true).await;

        if control.state().submitting && !config.allow_concurrent_submits {
            return Err(SubmitError::AlreadySubmitting);
        }
        control.managers.state.update(|state| state.submitting = true);
        if config.disable_form_while_submitting {
            control.managers.state.set_pair(PairState::Enabled, false);
        }

        let result = if valid || config.allow_invalid_submit {
            let Some(handler) = Self::resolve_handler(&control, valid) else {
                control.managers.state.update(|state| state.submitting = false);
                control.managers.state.set_pair(PairState::Enabled, true);
                return Err(SubmitError::NoHandler {
                    path: control.path().to_string(),
                });
            };

            Self::run_before_hooks(&control).await;
            let outcome = Self::invoke(handler, &control).await;
            let result = match outcome {
                Ok(SubmitOutcome::Success(_payload)) => {
                    if config.clear_storage_on_successful_submit {
                        control.managers.value.clear_storage();
                    }
                    match config.handle_successful_submit {
                        AfterSubmit::Disable => {
                            control.managers.state.set_pair(PairState::Enabled, false);
                        }
                        AfterSubmit::Reset => {
                            control.managers.state.set_pair(PairState::Enabled, true);
                            if let Err(error) = control.reset() {
                                tracing::warn!(%error, "reset after submit failed");
                            }
                        }
                        AfterSubmit::Enable => {
                            control.managers.state.set_pair(PairState::Enabled, true);
                        }
                    }
                    SubmitResult::Success
                }
                Ok(SubmitOutcome::Failure(payload)) => {
                    tracing::warn!(?payload, "submit handler signaled a recoverable error");
                    control.managers.state.set_pair(PairState::Enabled, true);
                    SubmitResult::Error
                }
                Err(error) => {
                    tracing::error!(%error, "submit handler failed");
                    control.managers.state.set_pair(PairState::Enabled, true);
                    SubmitResult::Error
                }
            };
            Self::run_after_hooks(&control).await;
            result
        } else {
            // Invalid branch: no value POST, only the dedicated handler.
            if let Some(SubmitHandler::Branch {
                invalid: Some(handler),
                ..
            }) = control.field().handle_submit.clone()
            {
                let _ = handler(Self::submit_context(&control)).await;
            }
            control.managers.state.set_pair(PairState::Enabled, true);
            SubmitResult::FormInvalid
        };

        control.managers.state.update(|state| {
            state.submitting = false;
            state.submitted = true;
            state.submit_result = result;
            state.submits += 1;
        });
        Ok(result)
    }

    fn submit_context(control: &Arc<Control>) -> SubmitContext {
        SubmitContext {
            value: control.value(),
            params: control.params(),
        }
    }

    /// Handler preference: function, URL, valid/invalid pair, resolver ref
    fn resolve_handler(control: &Arc<Control>, valid: bool) -> Option<ResolvedHandler> {
        match control.field().handle_submit.clone()? {
            SubmitHandler::Function(f) => Some(ResolvedHandler::Function(f)),
            SubmitHandler::Url(url) => Some(ResolvedHandler::Url(url)),
            SubmitHandler::Branch { valid: handler, .. } => {
                if valid {
                    handler.map(ResolvedHandler::Function)
                } else {
                    // Invalid submits allowed by config still prefer the
                    // invalid-branch handler.
                    match control.field().handle_submit.clone() {
                        Some(SubmitHandler::Branch {
                            invalid: Some(handler),
                            ..
                        }) => Some(ResolvedHandler::Function(handler)),
                        _ => None,
                    }
                }
            }
            SubmitHandler::Ref(reference) => {
                let registry = control.effective_resolvers();
                let resolver = registry.get(&reference.name)?.clone();
                let params = reference.params.clone();
                let f: SubmitFn = Arc::new(move |ctx: SubmitContext| {
                    let resolve_ctx = ResolveContext::new()
                        .with_value(ctx.value)
                        .with_params(ctx.params)
                        .with_reference(params.clone(), None);
                    let output = resolver(&resolve_ctx);
                    async move {
                        match output {
                            SlotOutput::Ready(value) => SubmitOutcome::Success(Some(value)),
                            other => {
                                let mut stream = other.into_stream();
                                SubmitOutcome::Success(stream.next().await)
                            }
                        }
                    }
                    .boxed()
                });
                Some(ResolvedHandler::Function(f))
            }
        }
    }

    async fn invoke(
        handler: ResolvedHandler,
        control: &Arc<Control>,
    ) -> Result<SubmitOutcome, String> {
        match handler {
            ResolvedHandler::Function(f) => Ok(f(Self::submit_context(control)).await),
            ResolvedHandler::Url(url) => Self::post_value(control, &url).await,
        }
    }

    /// POST the current value as JSON; non-2xx is a recoverable submit error
    async fn post_value(control: &Arc<Control>, url: &str) -> Result<SubmitOutcome, String> {
        let body = control.value().unwrap_or(Value::Null);
        let response = reqwest::Client::new()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|error| error.to_string())?;
        if response.status().is_success() {
            let payload = response.json::<Value>().await.ok();
            Ok(SubmitOutcome::Success(payload))
        } else {
            let status = response.status().to_string();
            Ok(SubmitOutcome::Failure(Some(Value::String(status))))
        }
    }

    /// Controls by tree depth, self first
    fn levels(control: &Arc<Control>) -> Vec<Vec<Arc<Control>>> {
        let mut levels = vec![vec![control.clone()]];
        loop {
            let next: Vec<Arc<Control>> = levels
                .last()
                .map(|level| {
                    level
                        .iter()
                        .flat_map(|c| c.managers.controls.children())
                        .collect()
                })
                .unwrap_or_default();
            if next.is_empty() {
                break;
            }
            levels.push(next);
        }
        levels
    }

    /// Depth-first, parallel within each level
    async fn run_before_hooks(control: &Arc<Control>) {
        for level in Self::levels(control) {
            let hooks = level.iter().filter_map(|c| {
                c.field()
                    .hooks
                    .on_before_submit
                    .clone()
                    .map(|hook| hook(c))
            });
            join_all(hooks).await;
        }
    }

    async fn run_after_hooks(control: &Arc<Control>) {
        for level in Self::levels(control) {
            let hooks = level.iter().filter_map(|c| {
                c.field()
                    .hooks
                    .on_after_submit
                    .clone()
                    .map(|hook| hook(c))
            });
            join_all(hooks).await;
        }
    }
}

enum ResolvedHandler {
    Function(SubmitFn),
    Url(String),
}

impl ManagerLifecycle for EventsManager {}
