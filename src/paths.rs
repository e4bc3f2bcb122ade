//! Namespaced template search paths, frozen after setup.
//!
//! Paths are registered through [`TemplatePathsBuilder`] during application
//! wiring and frozen into an immutable [`TemplatePaths`] before the first
//! render. Resolution walks a namespace's roots in registration order and
//! accepts the first existing candidate whose real path stays inside the
//! registered root.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::sanitize::{sanitize_base_path, sanitize_template_name};

/// Namespace used when a template identifier carries no `ns::` prefix.
pub const DEFAULT_NAMESPACE: &str = "";

const DEFAULT_EXTENSION: &str = "html";

/// Append-only registration surface for template search paths.
#[derive(Debug, Default)]
pub struct TemplatePathsBuilder {
    entries: Vec<(String, PathBuf)>,
    default_ext: Option<String>,
}

impl TemplatePathsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extension appended to template names that carry none. Defaults to `html`.
    pub fn default_extension(mut self, ext: impl Into<String>) -> Self {
        self.default_ext = Some(ext.into());
        self
    }

    /// Register a search root for `namespace` (`None` for the default
    /// namespace). Roots registered first are searched first.
    pub fn add_path(
        mut self,
        namespace: Option<&str>,
        base: impl Into<PathBuf>,
    ) -> Result<Self, EngineError> {
        let base = base.into();
        sanitize_base_path(&base.to_string_lossy())?;
        self.entries.push((
            namespace.unwrap_or(DEFAULT_NAMESPACE).to_string(),
            base,
        ));
        Ok(self)
    }

    /// Freeze into an immutable path set.
    pub fn build(self) -> TemplatePaths {
        let mut by_namespace: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for (ns, base) in self.entries {
            by_namespace.entry(ns).or_default().push(base);
        }
        TemplatePaths {
            by_namespace,
            default_ext: self.default_ext.unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            fingerprint: OnceCell::new(),
        }
    }
}

/// Immutable namespace → ordered search-root map.
#[derive(Debug)]
pub struct TemplatePaths {
    by_namespace: HashMap<String, Vec<PathBuf>>,
    default_ext: String,
    fingerprint: OnceCell<String>,
}

impl TemplatePaths {
    /// Resolve `namespace::name` (or bare `name`) to an on-disk file.
    ///
    /// Returns `Ok(None)` when no registered root yields an existing file
    /// that is a real descendant of that root; the caller decides whether
    /// that is a `TemplateNotFound`.
    pub fn resolve(&self, name: &str) -> Result<Option<PathBuf>, EngineError> {
        let (namespace, template) = split_identifier(name);
        sanitize_template_name(template)?;

        let file = self.with_default_extension(template);
        let Some(roots) = self.roots_for(namespace) else {
            debug!(event = "Resolve", phase = "NoRoots", namespace, template);
            return Ok(None);
        };

        for root in roots {
            let candidate = root.join(&file);
            if !candidate.is_file() {
                continue;
            }
            // Candidate exists; make sure following symlinks did not walk
            // out of the registered root.
            let real = fs::canonicalize(&candidate)?;
            let real_root = fs::canonicalize(root)?;
            if real.starts_with(&real_root) {
                debug!(
                    event = "Resolve",
                    phase = "Hit",
                    namespace,
                    template,
                    path = %real.display()
                );
                return Ok(Some(real));
            }
            warn!(
                event = "Resolve",
                phase = "EscapeRejected",
                namespace,
                template,
                candidate = %candidate.display(),
                real = %real.display()
            );
        }
        Ok(None)
    }

    /// Stable digest over the registered namespace → root map, memoized on
    /// first use. Keys cache entries so a redeploy with different paths
    /// never serves stale renders.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            for ns in self.by_namespace.keys().sorted() {
                hasher.update(ns.as_bytes());
                hasher.update([0u8]);
                for root in &self.by_namespace[ns] {
                    hasher.update(root.to_string_lossy().as_bytes());
                    hasher.update([0u8]);
                }
            }
            hasher.update(self.default_ext.as_bytes());
            format!("{:x}", hasher.finalize())
        })
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.by_namespace.keys().map(String::as_str).sorted().collect()
    }

    fn roots_for(&self, namespace: &str) -> Option<&Vec<PathBuf>> {
        match self.by_namespace.get(namespace) {
            Some(roots) => Some(roots),
            // Namespaced lookups fall back to the default namespace list.
            None if namespace != DEFAULT_NAMESPACE => self.by_namespace.get(DEFAULT_NAMESPACE),
            None => None,
        }
    }

    fn with_default_extension(&self, template: &str) -> String {
        if Path::new(template).extension().is_some() {
            template.to_string()
        } else {
            format!("{template}.{}", self.default_ext)
        }
    }
}

/// Split `namespace::template`; no `::` means the default namespace.
pub(crate) fn split_identifier(name: &str) -> (&str, &str) {
    match name.split_once("::") {
        Some((ns, template)) => (ns, template),
        None => (DEFAULT_NAMESPACE, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn first_registered_root_wins() {
        let p1 = TempDir::new().unwrap();
        let p2 = TempDir::new().unwrap();
        write_file(p1.path(), "x.html", "from-p1");
        write_file(p2.path(), "x.html", "from-p2");

        let paths = TemplatePathsBuilder::new()
            .add_path(Some("app"), p1.path())
            .unwrap()
            .add_path(Some("app"), p2.path())
            .unwrap()
            .build();

        let resolved = paths.resolve("app::x").unwrap().unwrap();
        assert_eq!(fs::read_to_string(resolved).unwrap(), "from-p1");
    }

    #[test]
    fn later_root_used_when_first_misses() {
        let p1 = TempDir::new().unwrap();
        let p2 = TempDir::new().unwrap();
        write_file(p2.path(), "only.html", "from-p2");

        let paths = TemplatePathsBuilder::new()
            .add_path(Some("app"), p1.path())
            .unwrap()
            .add_path(Some("app"), p2.path())
            .unwrap()
            .build();

        let resolved = paths.resolve("app::only").unwrap().unwrap();
        assert_eq!(fs::read_to_string(resolved).unwrap(), "from-p2");
    }

    #[test]
    fn unknown_namespace_falls_back_to_default() {
        let base = TempDir::new().unwrap();
        write_file(base.path(), "shared.html", "default-ns");

        let paths = TemplatePathsBuilder::new()
            .add_path(None, base.path())
            .unwrap()
            .build();

        assert!(paths.resolve("nosuchns::shared").unwrap().is_some());
    }

    #[test]
    fn explicit_extension_is_preserved() {
        let base = TempDir::new().unwrap();
        write_file(base.path(), "mail.txt", "plain");

        let paths = TemplatePathsBuilder::new()
            .add_path(None, base.path())
            .unwrap()
            .build();

        assert!(paths.resolve("mail.txt").unwrap().is_some());
        assert!(paths.resolve("mail").unwrap().is_none());
    }

    #[test]
    fn missing_template_resolves_to_none() {
        let base = TempDir::new().unwrap();
        let paths = TemplatePathsBuilder::new()
            .add_path(None, base.path())
            .unwrap()
            .build();
        assert!(paths.resolve("ghost").unwrap().is_none());
    }

    #[test]
    fn traversal_in_template_name_is_rejected() {
        let base = TempDir::new().unwrap();
        let paths = TemplatePathsBuilder::new()
            .add_path(None, base.path())
            .unwrap()
            .build();
        assert!(matches!(
            paths.resolve("../../etc/passwd"),
            Err(EngineError::PathTraversal(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() {
        let base = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write_file(outside.path(), "secret.html", "outside");
        std::os::unix::fs::symlink(
            outside.path().join("secret.html"),
            base.path().join("leak.html"),
        )
        .unwrap();

        let paths = TemplatePathsBuilder::new()
            .add_path(None, base.path())
            .unwrap()
            .build();

        assert!(paths.resolve("leak").unwrap().is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let p1 = TempDir::new().unwrap();
        let p2 = TempDir::new().unwrap();

        let a = TemplatePathsBuilder::new()
            .add_path(Some("app"), p1.path())
            .unwrap()
            .add_path(Some("app"), p2.path())
            .unwrap()
            .build();
        let b = TemplatePathsBuilder::new()
            .add_path(Some("app"), p1.path())
            .unwrap()
            .add_path(Some("app"), p2.path())
            .unwrap()
            .build();
        let reordered = TemplatePathsBuilder::new()
            .add_path(Some("app"), p2.path())
            .unwrap()
            .add_path(Some("app"), p1.path())
            .unwrap()
            .build();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), reordered.fingerprint());
    }
}
