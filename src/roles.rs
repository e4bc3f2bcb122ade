//! Role hierarchy and permission table, precomputed at configuration time.
//!
//! Roles form a DAG over declared parents; holding a role implies holding
//! every ancestor. Both the ancestor closure and the effective permission set
//! of each role are expanded once in [`RoleGraphBuilder::build`], so request
//! time checks are set lookups against frozen tables. This is the single
//! source of truth for every consumer of the hierarchy.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;

/// Serde-loadable role graph declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RoleGraphConfig {
    pub roles: Vec<RoleDecl>,
    /// Permission key → roles that own it directly.
    pub permissions: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleDecl {
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// Setup-time surface for [`RoleGraph`].
#[derive(Debug, Default)]
pub struct RoleGraphBuilder {
    roles: Vec<RoleDecl>,
    grants: Vec<(String, String)>,
}

impl RoleGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a role and its direct parents.
    pub fn role<I, S>(mut self, name: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.push(RoleDecl {
            name: name.into(),
            parents: parents.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Grant a permission key directly to a role.
    pub fn permit(mut self, permission: impl Into<String>, role: impl Into<String>) -> Self {
        self.grants.push((permission.into(), role.into()));
        self
    }

    pub fn from_config(mut self, config: &RoleGraphConfig) -> Self {
        self.roles.extend(config.roles.iter().cloned());
        for (permission, roles) in &config.permissions {
            for role in roles {
                self.grants.push((permission.clone(), role.clone()));
            }
        }
        self
    }

    /// Validate the DAG and freeze the closure and permission tables.
    pub fn build(self) -> Result<RoleGraph, EngineError> {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for decl in &self.roles {
            if parents.contains_key(&decl.name) {
                return Err(EngineError::RoleConfig(format!(
                    "role declared twice: {}",
                    decl.name
                )));
            }
            parents.insert(decl.name.clone(), decl.parents.clone());
        }
        for decl in &self.roles {
            for parent in &decl.parents {
                if !parents.contains_key(parent) {
                    return Err(EngineError::RoleConfig(format!(
                        "role {} names unknown parent {}",
                        decl.name, parent
                    )));
                }
            }
        }

        let mut closures: HashMap<String, BTreeSet<String>> = HashMap::new();
        for decl in &self.roles {
            let mut stack = Vec::new();
            expand(&decl.name, &parents, &mut closures, &mut stack)?;
        }

        let mut direct: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (permission, role) in &self.grants {
            if !parents.contains_key(role) {
                return Err(EngineError::RoleConfig(format!(
                    "permission {permission} granted to unknown role {role}"
                )));
            }
            direct
                .entry(role.clone())
                .or_default()
                .insert(permission.clone());
        }

        // Effective permissions: everything owned by any role in the closure.
        let mut effective: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (role, closure) in &closures {
            let mut perms = BTreeSet::new();
            for ancestor in closure {
                if let Some(owned) = direct.get(ancestor) {
                    perms.extend(owned.iter().cloned());
                }
            }
            effective.insert(role.clone(), perms);
        }

        Ok(RoleGraph { closures, effective })
    }
}

/// Memoized closure expansion with cycle detection along the active path.
fn expand(
    role: &str,
    parents: &HashMap<String, Vec<String>>,
    closures: &mut HashMap<String, BTreeSet<String>>,
    stack: &mut Vec<String>,
) -> Result<BTreeSet<String>, EngineError> {
    if let Some(done) = closures.get(role) {
        return Ok(done.clone());
    }
    if stack.iter().any(|r| r == role) {
        return Err(EngineError::RoleConfig(format!(
            "role hierarchy cycle: {} -> {role}",
            stack.join(" -> ")
        )));
    }
    stack.push(role.to_string());

    let mut closure = BTreeSet::new();
    closure.insert(role.to_string());
    if let Some(direct_parents) = parents.get(role) {
        for parent in direct_parents {
            closure.extend(expand(parent, parents, closures, stack)?);
        }
    }

    stack.pop();
    closures.insert(role.to_string(), closure.clone());
    Ok(closure)
}

/// Frozen role hierarchy with precomputed closures and permission sets.
#[derive(Debug, Clone)]
pub struct RoleGraph {
    closures: HashMap<String, BTreeSet<String>>,
    effective: HashMap<String, BTreeSet<String>>,
}

impl RoleGraph {
    pub fn builder() -> RoleGraphBuilder {
        RoleGraphBuilder::new()
    }

    /// The role plus all transitively implied ancestors. Unknown roles have
    /// an empty closure.
    pub fn closure(&self, role: &str) -> BTreeSet<String> {
        self.closures.get(role).cloned().unwrap_or_default()
    }

    /// Union of the closures of every held role.
    pub fn closure_of<'a, I: IntoIterator<Item = &'a str>>(&self, roles: I) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for role in roles {
            if let Some(closure) = self.closures.get(role) {
                out.extend(closure.iter().cloned());
            }
        }
        out
    }

    /// Is `permission` covered by the closure of any held role?
    pub fn is_granted<'a, I: IntoIterator<Item = &'a str>>(
        &self,
        roles: I,
        permission: &str,
    ) -> bool {
        roles.into_iter().any(|role| {
            self.effective
                .get(role)
                .is_some_and(|perms| perms.contains(permission))
        })
    }

    /// Does any held role's closure contain `required`? The strict check
    /// used for top-tier-only operations, independent of the permission
    /// table.
    pub fn holds<'a, I: IntoIterator<Item = &'a str>>(&self, roles: I, required: &str) -> bool {
        roles
            .into_iter()
            .any(|role| self.closures.get(role).is_some_and(|c| c.contains(required)))
    }

    pub fn roles(&self) -> Vec<&str> {
        self.closures.keys().map(String::as_str).sorted().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    /// Linear hierarchy from the mark admin scaffold: supermark inherits all.
    fn mark_hierarchy() -> RoleGraph {
        RoleGraph::builder()
            .role("user", Vec::<String>::new())
            .role("editor", ["user"])
            .role("mark", ["editor"])
            .role("supermark", ["mark"])
            .permit("view.public", "user")
            .permit("content.edit", "editor")
            .permit("content.publish", "mark")
            .permit("system.admin", "supermark")
            .build()
            .unwrap()
    }

    #[parameterized(
        mark_inherits_user_permission = { "mark", "view.public", true },
        mark_inherits_editor_permission = { "mark", "content.edit", true },
        mark_own_permission = { "mark", "content.publish", true },
        mark_denied_top_tier = { "mark", "system.admin", false },
        user_denied_editor_permission = { "user", "content.edit", false },
        supermark_inherits_everything = { "supermark", "view.public", true },
        supermark_own_permission = { "supermark", "system.admin", true },
        unknown_role_denied = { "ghost", "view.public", false },
    )]
    fn permission_checks(role: &str, permission: &str, expected: bool) {
        let graph = mark_hierarchy();
        assert_eq!(graph.is_granted([role], permission), expected);
    }

    #[test]
    fn closure_is_reflexive_and_transitive() {
        let graph = mark_hierarchy();
        let closure = graph.closure("mark");
        assert_eq!(
            closure.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["editor", "mark", "user"]
        );
    }

    #[test]
    fn holds_checks_closure_membership() {
        let graph = mark_hierarchy();
        assert!(graph.holds(["supermark"], "supermark"));
        assert!(graph.holds(["supermark"], "user"));
        assert!(!graph.holds(["mark"], "supermark"));
    }

    #[test]
    fn diamond_hierarchy_unions_both_branches() {
        let graph = RoleGraph::builder()
            .role("base", Vec::<String>::new())
            .role("left", ["base"])
            .role("right", ["base"])
            .role("top", ["left", "right"])
            .permit("l", "left")
            .permit("r", "right")
            .build()
            .unwrap();
        assert!(graph.is_granted(["top"], "l"));
        assert!(graph.is_granted(["top"], "r"));
        assert_eq!(graph.closure("top").len(), 4);
    }

    #[test]
    fn cycle_is_rejected() {
        let err = RoleGraph::builder()
            .role("a", ["b"])
            .role("b", ["a"])
            .build();
        assert!(matches!(err, Err(EngineError::RoleConfig(_))));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let err = RoleGraph::builder().role("a", ["nope"]).build();
        assert!(matches!(err, Err(EngineError::RoleConfig(_))));
    }

    #[test]
    fn grant_to_unknown_role_is_rejected() {
        let err = RoleGraph::builder()
            .role("a", Vec::<String>::new())
            .permit("p", "nope")
            .build();
        assert!(matches!(err, Err(EngineError::RoleConfig(_))));
    }

    #[test]
    fn loads_from_config() {
        let config: RoleGraphConfig = serde_json::from_str(
            r#"{
                "roles": [
                    {"name": "user"},
                    {"name": "mark", "parents": ["user"]}
                ],
                "permissions": {"view.public": ["user"]}
            }"#,
        )
        .unwrap();
        let graph = RoleGraph::builder().from_config(&config).build().unwrap();
        assert!(graph.is_granted(["mark"], "view.public"));
    }
}
