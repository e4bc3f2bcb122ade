//! Template rendering with parameter precedence and layout composition.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::context::TemplateContext;
use crate::error::EngineError;
use crate::paths::TemplatePaths;
use crate::template::{self, ExecutedTemplate};
use crate::traits::Render;
use crate::types::TemplateParams;

/// Upper bound on the layout chain; a chain this deep is a wiring mistake.
const MAX_LAYOUT_DEPTH: usize = 10;

/// Setup-time surface for [`Renderer`]. Frozen on `build`; nothing about a
/// renderer is mutable after construction.
pub struct RendererBuilder {
    paths: TemplatePaths,
    context: TemplateContext,
    globals: TemplateParams,
    template_defaults: HashMap<String, TemplateParams>,
}

impl RendererBuilder {
    pub fn new(paths: TemplatePaths) -> Self {
        RendererBuilder {
            paths,
            context: TemplateContext::default(),
            globals: TemplateParams::new(),
            template_defaults: HashMap::new(),
        }
    }

    pub fn context(mut self, context: TemplateContext) -> Self {
        self.context = context;
        self
    }

    /// Default parameter visible to every template, lowest precedence.
    pub fn global(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.set(key, value);
        self
    }

    /// Defaults for one template identifier, overriding globals but not
    /// call-site parameters.
    pub fn template_default(
        mut self,
        template: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.template_defaults
            .entry(template.into())
            .or_default()
            .set(key, value);
        self
    }

    pub fn build(self) -> Renderer {
        Renderer {
            inner: Arc::new(RendererInner {
                paths: self.paths,
                context: self.context,
                globals: self.globals,
                template_defaults: self.template_defaults,
            }),
        }
    }
}

struct RendererInner {
    paths: TemplatePaths,
    context: TemplateContext,
    globals: TemplateParams,
    template_defaults: HashMap<String, TemplateParams>,
}

/// The rendering engine handle. Cloneable and thread-safe; all state is
/// frozen configuration, so concurrent and reentrant renders never interact.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<RendererInner>,
}

impl Renderer {
    pub fn builder(paths: TemplatePaths) -> RendererBuilder {
        RendererBuilder::new(paths)
    }

    /// Digest of the registered search paths, used in cache keys.
    pub fn path_fingerprint(&self) -> &str {
        self.inner.paths.fingerprint()
    }

    /// Merge precedence: globals < per-template defaults < call-site params.
    fn scope_for(&self, name: &str, params: &TemplateParams) -> TemplateParams {
        let mut scope = match self.inner.template_defaults.get(name) {
            Some(defaults) => self.inner.globals.merged_with(defaults),
            None => self.inner.globals.clone(),
        };
        scope = scope.merged_with(params);
        scope
    }

    fn render_one(
        &self,
        name: &str,
        scope: &TemplateParams,
    ) -> Result<ExecutedTemplate, EngineError> {
        let path = self
            .inner
            .paths
            .resolve(name)?
            .ok_or_else(|| EngineError::TemplateNotFound(name.to_string()))?;
        let source = fs::read_to_string(&path)?;
        let nodes = template::parse(&source)?;
        debug!(
            event = "Render",
            phase = "Execute",
            template = name,
            path = %path.display(),
            params = %scope
        );
        template::execute(&nodes, scope, &self.inner.context)
    }
}

impl Render for Renderer {
    fn render(&self, name: &str, params: &TemplateParams) -> Result<String, EngineError> {
        debug!(event = "Render", phase = "Start", template = name);

        let executed = self.render_one(name, &self.scope_for(name, params))?;
        let mut body = executed.body;
        let mut pending = executed.layout;
        // Chain of template names rendered so far, for cycle detection.
        let mut seen = vec![name.to_string()];

        while let Some(request) = pending {
            if seen.contains(&request.name) {
                return Err(EngineError::RenderError(format!(
                    "layout cycle: {} -> {}",
                    seen.join(" -> "),
                    request.name
                )));
            }
            if seen.len() >= MAX_LAYOUT_DEPTH {
                return Err(EngineError::RenderError(format!(
                    "layout chain exceeds depth {MAX_LAYOUT_DEPTH}"
                )));
            }
            seen.push(request.name.clone());

            let mut scope = self.scope_for(&request.name, &request.params);
            // The freshly rendered body always wins the `content` slot.
            scope.set("content", body);
            debug!(
                event = "Render",
                phase = "Layout",
                template = name,
                layout = request.name.as_str()
            );
            let executed = self.render_one(&request.name, &scope)?;
            body = executed.body;
            pending = executed.layout;
        }

        debug!(
            event = "Render",
            phase = "Done",
            template = name,
            bytes = body.len()
        );
        Ok(body)
    }
}
