//! Fixed capability set exposed to template code.
//!
//! Templates never see the renderer or any mutable registry; they get
//! exactly this: HTML escaping, route URL generation, and asset path
//! prefixing. The set is built once during wiring and shared read-only
//! across renders.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::types::TemplateParams;

/// Serde-loadable route table: route name → path pattern with `{param}`
/// placeholders (e.g. `"post.show" → "/posts/{id}"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RouteTableConfig {
    pub routes: HashMap<String, String>,
}

/// Immutable helper capabilities available inside templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    routes: HashMap<String, String>,
    asset_prefix: String,
    asset_version: Option<String>,
}

/// Setup-time surface for [`TemplateContext`].
#[derive(Debug, Default)]
pub struct TemplateContextBuilder {
    inner: TemplateContext,
}

impl TemplateContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.inner.routes.insert(name.into(), pattern.into());
        self
    }

    pub fn routes_from_config(mut self, config: &RouteTableConfig) -> Self {
        for (name, pattern) in &config.routes {
            self.inner.routes.insert(name.clone(), pattern.clone());
        }
        self
    }

    /// Prefix prepended by the `asset()` helper, e.g. `/static`.
    pub fn asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.asset_prefix = prefix.into();
        self
    }

    /// Optional cache-busting version appended as `?v=...`.
    pub fn asset_version(mut self, version: impl Into<String>) -> Self {
        self.inner.asset_version = Some(version.into());
        self
    }

    pub fn build(self) -> TemplateContext {
        self.inner
    }
}

impl TemplateContext {
    pub fn builder() -> TemplateContextBuilder {
        TemplateContextBuilder::new()
    }

    /// HTML-entity-encode a scalar value. Null and non-scalar values render
    /// as the empty string.
    pub fn escape_html(&self, value: &Value) -> String {
        let raw = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => return String::new(),
        };
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#039;"),
                _ => out.push(c),
            }
        }
        out
    }

    /// Expand a named route pattern with the given parameters.
    ///
    /// Every `{placeholder}` must be covered by a scalar parameter; the
    /// values are percent-encoded into the path.
    pub fn url(&self, route: &str, params: &TemplateParams) -> Result<String, EngineError> {
        let pattern = self
            .routes
            .get(route)
            .ok_or_else(|| EngineError::RouteError(format!("unknown route: {route}")))?;

        let mut out = String::with_capacity(pattern.len());
        let mut rest = pattern.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                EngineError::RouteError(format!("unbalanced placeholder in route {route}"))
            })?;
            let key = &after[..close];
            let value = params.get(key).ok_or_else(|| {
                EngineError::RouteError(format!("missing parameter {key:?} for route {route}"))
            })?;
            out.push_str(&percent_encode(&scalar_string(key, value)?));
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Prefix an asset path, appending the configured version if any.
    pub fn asset(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        let base = if self.asset_prefix.is_empty() {
            format!("/{path}")
        } else {
            format!("{}/{path}", self.asset_prefix.trim_end_matches('/'))
        };
        match &self.asset_version {
            Some(v) => format!("{base}?v={v}"),
            None => base,
        }
    }
}

fn scalar_string(key: &str, value: &Value) -> Result<String, EngineError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(EngineError::RouteError(format!(
            "route parameter {key:?} is not a scalar"
        ))),
    }
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
