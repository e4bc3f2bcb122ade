//! Resolved authenticated identity with its declared role set.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A resolved identity: opaque id, declared roles, and an active flag.
///
/// The role set holds only the roles as declared; the transitive closure over
/// role ancestors is computed by the role graph, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct Principal {
    id: String,
    roles: BTreeSet<String>,
    active: bool,
}

impl Principal {
    pub fn new<I, S>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Principal {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            active: true,
        }
    }

    /// Mark this principal inactive (disabled account, pending deletion).
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let roles: Vec<&str> = self.roles.iter().map(String::as_str).collect();
        write!(f, "{} [{}]", self.id, roles.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_roles_sorted() {
        let p = Principal::new("alice", ["mark", "editor"]);
        assert_eq!(p.to_string(), "alice [editor, mark]");
        assert!(p.is_active());
    }

    #[test]
    fn deactivated_clears_active_flag() {
        let p = Principal::new("bob", ["user"]).deactivated();
        assert!(!p.is_active());
    }
}
