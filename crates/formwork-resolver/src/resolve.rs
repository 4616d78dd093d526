//! Combined mapping resolution
//!
//! [`resolve_map`] takes the per-slot outputs of a named mapping and produces
//! either an immediately available combined map (every slot synchronous) or a
//! single combined stream. The stream's first emission happens only once all
//! slots have produced at least one value — a synchronous slot's value is
//! never emitted alone ahead of its async siblings — and further emissions
//! follow whenever a stream-backed slot updates.

use crate::context::ResolveContext;
use crate::expr::Expr;
use crate::output::SlotOutput;
use crate::registry::ResolverRegistry;
use formwork_value::Value;
use futures::stream::{BoxStream, SelectAll};
use futures::StreamExt;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

/// Combined result of a mapping resolution, keyed by slot name
pub type SlotMap = IndexMap<String, Value>;

/// Options controlling mapping resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Pass literal (non-function) slot values through; drop them when false
    pub resolve_static: bool,
    /// How long a slot may stay silent before a non-fatal warning is logged
    pub grace_period: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            resolve_static: true,
            grace_period: Duration::from_millis(2000),
        }
    }
}

impl ResolveOptions {
    /// Default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop literal slot values instead of passing them through
    #[inline]
    #[must_use]
    pub fn without_static(mut self) -> Self {
        self.resolve_static = false;
        self
    }

    /// Override the slow-slot warning grace period
    #[inline]
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// Resolution of a whole slot mapping
pub enum MapResolution {
    /// Every slot resolved synchronously
    Ready(SlotMap),
    /// Combined asynchronous resolution
    Pending(BoxStream<'static, SlotMap>),
}

impl MapResolution {
    /// True when the mapping resolved synchronously
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The synchronous result, if there is one
    #[must_use]
    pub fn ready(self) -> Option<SlotMap> {
        match self {
            Self::Ready(map) => Some(map),
            Self::Pending(_) => None,
        }
    }

    /// Wait for the first combined result
    ///
    /// Returns an empty map if an async slot ends without ever emitting.
    pub async fn finish(self) -> SlotMap {
        match self {
            Self::Ready(map) => map,
            Self::Pending(mut stream) => stream.next().await.unwrap_or_default(),
        }
    }

    /// Adapt into a stream of combined snapshots
    ///
    /// A synchronous result becomes a single-emission stream.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, SlotMap> {
        match self {
            Self::Ready(map) => futures::stream::once(async move { map }).boxed(),
            Self::Pending(stream) => stream,
        }
    }
}

impl fmt::Debug for MapResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(map) => f.debug_tuple("Ready").field(map).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Resolve one expression slot
///
/// Returns `None` when the slot is dropped: a literal under
/// `resolve_static: false`, or a reference to a resolver that is not
/// registered (logged, never fatal).
#[must_use]
pub fn resolve_slot(
    expr: &Expr,
    registry: &ResolverRegistry,
    ctx: &ResolveContext,
    options: &ResolveOptions,
) -> Option<SlotOutput> {
    match expr {
        Expr::Literal(value) => options
            .resolve_static
            .then(|| SlotOutput::Ready(value.clone())),
        Expr::Func(f) => Some(f(ctx)),
        Expr::Ref(reference) => match registry.get(&reference.name) {
            Some(f) => {
                let ref_ctx = ctx
                    .clone()
                    .with_reference(reference.params.clone(), reference.error_message.clone());
                Some(f(&ref_ctx))
            }
            None => {
                tracing::warn!(resolver = %reference.name, "resolver not registered; slot omitted");
                None
            }
        },
    }
}

/// Resolve a whole expression mapping
#[must_use]
pub fn resolve_exprs(
    exprs: &IndexMap<String, Expr>,
    registry: &ResolverRegistry,
    ctx: &ResolveContext,
    options: &ResolveOptions,
) -> MapResolution {
    let slots = exprs
        .iter()
        .filter_map(|(name, expr)| {
            resolve_slot(expr, registry, ctx, options).map(|output| (name.clone(), output))
        })
        .collect();
    resolve_map(slots, options)
}

/// Combine per-slot outputs into one mapping resolution
#[must_use]
pub fn resolve_map(slots: Vec<(String, SlotOutput)>, options: &ResolveOptions) -> MapResolution {
    let order: Vec<String> = slots.iter().map(|(name, _)| name.clone()).collect();

    let mut values: HashMap<String, Value> = HashMap::new();
    let mut async_slots: Vec<(String, BoxStream<'static, Value>)> = Vec::new();
    for (name, output) in slots {
        match output {
            SlotOutput::Ready(value) => {
                values.insert(name, value);
            }
            other => async_slots.push((name, other.into_stream())),
        }
    }

    if async_slots.is_empty() {
        return MapResolution::Ready(snapshot(&order, &values));
    }

    let mut pending: HashSet<String> = HashSet::new();
    let mut select: SelectAll<BoxStream<'static, (String, Value)>> = SelectAll::new();
    for (name, stream) in async_slots {
        pending.insert(name.clone());
        select.push(stream.map(move |value| (name.clone(), value)).boxed());
    }

    let state = CombineState {
        order,
        values,
        pending,
        select,
        deadline: tokio::time::Instant::now() + options.grace_period,
        warned: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            let event = state.next_event().await?;
            match event {
                CombineEvent::GraceElapsed => {
                    let mut slow: Vec<&str> = state.pending.iter().map(String::as_str).collect();
                    slow.sort_unstable();
                    tracing::warn!(slots = ?slow, "resolver slots still pending after grace period");
                    state.warned = true;
                }
                CombineEvent::Slot(name, value) => {
                    state.pending.remove(&name);
                    state.values.insert(name, value);
                    if state.pending.is_empty() {
                        let combined = snapshot(&state.order, &state.values);
                        return Some((combined, state));
                    }
                }
            }
        }
    });

    MapResolution::Pending(stream.boxed())
}

fn snapshot(order: &[String], values: &HashMap<String, Value>) -> SlotMap {
    order
        .iter()
        .filter_map(|name| values.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}

enum CombineEvent {
    Slot(String, Value),
    GraceElapsed,
}

struct CombineState {
    order: Vec<String>,
    values: HashMap<String, Value>,
    pending: HashSet<String>,
    select: SelectAll<BoxStream<'static, (String, Value)>>,
    deadline: tokio::time::Instant,
    warned: bool,
}

impl CombineState {
    async fn next_event(&mut self) -> Option<CombineEvent> {
        if self.warned || self.pending.is_empty() {
            let (name, value) = self.select.next().await?;
            return Some(CombineEvent::Slot(name, value));
        }
        tokio::select! {
            item = self.select.next() => {
                let (name, value) = item?;
                Some(CombineEvent::Slot(name, value))
            }
            () = tokio::time::sleep_until(self.deadline) => Some(CombineEvent::GraceElapsed),
        }
    }
}
