//! Data model types for rendering parameters and authorization outcomes.
//!
//! Canonical forms:
//! - Template identifier: `namespace::name` or `name` (default namespace).
//! - Parameters: string-keyed JSON values with deterministic (sorted) order.
//! - Principal: opaque id plus a role set, resolved from the session identity.

mod decision;
mod params;
mod principal;

pub use decision::{AuthDecision, AuthDecisionKind};
pub use params::TemplateParams;
pub use principal::Principal;
