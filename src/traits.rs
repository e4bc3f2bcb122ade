use crate::error::EngineError;
use crate::types::{Principal, TemplateParams};

/// Anything that can turn a template identifier plus parameters into output.
///
/// Implemented by [`Renderer`](crate::Renderer) and by
/// [`CachedRenderer`](crate::CachedRenderer), so handlers can hold either
/// without caring whether caching is enabled for the deployment.
pub trait Render {
    fn render(&self, name: &str, params: &TemplateParams) -> Result<String, EngineError>;
}

/// Lookup seam over the external identity store (users table, directory,
/// fixture map in tests). The authorization chain resolves session identities
/// through this; storage errors propagate, an unknown id is simply `None`.
pub trait PrincipalSource: Send + Sync {
    fn find(&self, id: &str) -> Result<Option<Principal>, EngineError>;
}
