// src/lib.rs
pub use cache::{CachedRenderer, RenderCache};
pub use chain::AuthorizationChain;
pub use context::{RouteTableConfig, TemplateContext, TemplateContextBuilder};
pub use error::EngineError;
pub use paths::{DEFAULT_NAMESPACE, TemplatePaths, TemplatePathsBuilder};
pub use renderer::{Renderer, RendererBuilder};
pub use roles::{RoleDecl, RoleGraph, RoleGraphBuilder, RoleGraphConfig};
pub use sanitize::{sanitize_base_path, sanitize_template_name};
pub use session::{IDENTITY_KEY, MemorySession, ROLES_KEY, Session, clear_identity};
pub use template::{ExecutedTemplate, LayoutRequest};
pub use traits::{PrincipalSource, Render};
pub use types::{AuthDecision, AuthDecisionKind, Principal, TemplateParams};

mod cache;
mod chain;
mod context;
mod error;
mod paths;
mod renderer;
mod roles;
mod sanitize;
mod session;
mod template;
mod traits;
mod types;
