//! Resolver protocol for the Formwork control engine
//!
//! A field property may be a literal value, a function, or a reference to a
//! named resolver (`"$$resolverName:params:errorMessage"` or the object
//! form). This crate resolves such properties against layered registries and
//! combines a whole mapping of them into one result that is synchronous when
//! every slot is, and a single combined asynchronous stream otherwise:
//!
//! - [`Expr`] — one property expression
//! - [`Registry`] — named resolver/validator functions, nearer-wins layering
//! - [`SlotOutput`] — ready / deferred / stream output of one slot
//! - [`resolve_map`] / [`resolve_exprs`] — the combined mapping resolution
//!
//! The combining rule: a synchronous-only mapping resolves immediately; a
//! mapping with any asynchronous slot emits its first combined snapshot only
//! once every slot has produced at least one value, then re-emits whenever a
//! stream-backed slot updates. Slots still silent after a grace period are
//! named in a non-fatal warning and allowed to complete late.

pub mod context;
pub mod expr;
pub mod output;
pub mod registry;
pub mod resolve;

pub use context::ResolveContext;
pub use expr::{Expr, ResolverRef, RESOLVER_REF_PREFIX};
pub use output::{SlotOutput, ValidatorOutcome};
pub use registry::{Registry, ResolverFn, ResolverRegistry, ValidatorFn, ValidatorRegistry};
pub use resolve::{resolve_exprs, resolve_map, MapResolution, ResolveOptions, SlotMap};
