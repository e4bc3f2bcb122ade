//! The tiered role-authorization chain.
//!
//! Per request: session identity → principal resolution → closure-based
//! permission check → outcome. Unauthenticated and forbidden requests
//! short-circuit here with an [`AuthDecision`] the handler maps to a
//! redirect, 401, or 403; application handlers only ever see `Authorized`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::roles::RoleGraph;
use crate::session::{IDENTITY_KEY, Session, clear_identity};
use crate::traits::PrincipalSource;
use crate::types::{AuthDecision, Principal};

/// Frozen authorization pipeline shared across requests.
#[derive(Clone)]
pub struct AuthorizationChain {
    graph: Arc<RoleGraph>,
    source: Arc<dyn PrincipalSource>,
    login_route: String,
}

impl AuthorizationChain {
    pub fn new(
        graph: RoleGraph,
        source: Arc<dyn PrincipalSource>,
        login_route: impl Into<String>,
    ) -> Self {
        AuthorizationChain {
            graph: Arc::new(graph),
            source,
            login_route: login_route.into(),
        }
    }

    /// Base check: the session's principal must cover `permission` through
    /// its role closure.
    ///
    /// On any failure the identity session keys are cleared so a stale
    /// principal cannot be replayed on the next request.
    pub fn authorize(
        &self,
        session: &mut dyn Session,
        permission: &str,
    ) -> Result<AuthDecision, EngineError> {
        let decision = self.check_permission(session, permission)?;
        debug!(
            event = "Authorize",
            phase = "Outcome",
            permission,
            outcome = %decision.kind()
        );
        Ok(decision)
    }

    fn check_permission(
        &self,
        session: &mut dyn Session,
        permission: &str,
    ) -> Result<AuthDecision, EngineError> {
        let principal = match self.resolve(session)? {
            Ok(principal) => principal,
            Err(decision) => return Ok(decision),
        };

        let roles = principal.roles().iter().map(String::as_str);
        if !self.graph.is_granted(roles, permission) {
            warn!(
                event = "Authorize",
                phase = "Denied",
                principal = principal.id(),
                permission
            );
            clear_identity(session);
            return Ok(AuthDecision::Forbidden {
                requirement: permission.to_string(),
            });
        }

        info!(
            event = "Authorize",
            phase = "Granted",
            principal = principal.id(),
            permission
        );
        Ok(self.authorized(principal))
    }

    /// Strict check for irreversible operations: the principal must hold
    /// `role` in its closure, regardless of the permission table.
    pub fn require_role(
        &self,
        session: &mut dyn Session,
        role: &str,
    ) -> Result<AuthDecision, EngineError> {
        let decision = self.check_role(session, role)?;
        debug!(
            event = "Authorize",
            phase = "Outcome",
            required = role,
            outcome = %decision.kind()
        );
        Ok(decision)
    }

    fn check_role(
        &self,
        session: &mut dyn Session,
        role: &str,
    ) -> Result<AuthDecision, EngineError> {
        let principal = match self.resolve(session)? {
            Ok(principal) => principal,
            Err(decision) => return Ok(decision),
        };

        let roles = principal.roles().iter().map(String::as_str);
        if !self.graph.holds(roles, role) {
            warn!(
                event = "Authorize",
                phase = "RoleDenied",
                principal = principal.id(),
                required = role
            );
            clear_identity(session);
            return Ok(AuthDecision::Forbidden {
                requirement: format!("role:{role}"),
            });
        }

        info!(
            event = "Authorize",
            phase = "RoleGranted",
            principal = principal.id(),
            required = role
        );
        Ok(self.authorized(principal))
    }

    /// Session identity → active principal, or the terminal decision.
    fn resolve(
        &self,
        session: &mut dyn Session,
    ) -> Result<Result<Principal, AuthDecision>, EngineError> {
        let Some(identity) = session.get(IDENTITY_KEY) else {
            debug!(event = "Authorize", phase = "NoIdentity");
            return Ok(Err(self.unauthenticated()));
        };

        match self.source.find(&identity)? {
            Some(principal) if principal.is_active() => Ok(Ok(principal)),
            Some(principal) => {
                warn!(
                    event = "Authorize",
                    phase = "InactivePrincipal",
                    principal = principal.id()
                );
                clear_identity(session);
                Ok(Err(self.unauthenticated()))
            }
            None => {
                warn!(event = "Authorize", phase = "UnknownIdentity", identity);
                clear_identity(session);
                Ok(Err(self.unauthenticated()))
            }
        }
    }

    fn authorized(&self, principal: Principal) -> AuthDecision {
        let role_closure = self
            .graph
            .closure_of(principal.roles().iter().map(String::as_str));
        AuthDecision::Authorized {
            principal,
            role_closure,
        }
    }

    fn unauthenticated(&self) -> AuthDecision {
        AuthDecision::Unauthenticated {
            login_route: self.login_route.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySession, ROLES_KEY};
    use std::collections::HashMap;

    struct FixturePrincipals(HashMap<String, Principal>);

    impl FixturePrincipals {
        fn new(principals: impl IntoIterator<Item = Principal>) -> Arc<Self> {
            Arc::new(Self(
                principals
                    .into_iter()
                    .map(|p| (p.id().to_string(), p))
                    .collect(),
            ))
        }
    }

    impl PrincipalSource for FixturePrincipals {
        fn find(&self, id: &str) -> Result<Option<Principal>, EngineError> {
            Ok(self.0.get(id).cloned())
        }
    }

    fn chain() -> AuthorizationChain {
        let graph = RoleGraph::builder()
            .role("user", Vec::<String>::new())
            .role("editor", ["user"])
            .role("mark", ["editor"])
            .role("supermark", ["mark"])
            .permit("view.public", "user")
            .permit("content.publish", "mark")
            .permit("system.admin", "supermark")
            .build()
            .unwrap();
        let source = FixturePrincipals::new([
            Principal::new("alice", ["supermark"]),
            Principal::new("bob", ["mark"]),
            Principal::new("mallory", ["mark"]).deactivated(),
        ]);
        AuthorizationChain::new(graph, source, "/mark/login")
    }

    #[test]
    fn unauthenticated_session_redirects_to_login() {
        let mut session = MemorySession::new();
        let decision = chain().authorize(&mut session, "view.public").unwrap();
        assert_eq!(
            decision,
            AuthDecision::Unauthenticated {
                login_route: "/mark/login".into()
            }
        );
    }

    #[test]
    fn unknown_identity_is_cleared_and_unauthenticated() {
        let mut session = MemorySession::with_identity("ghost");
        let decision = chain().authorize(&mut session, "view.public").unwrap();
        assert!(!decision.is_authorized());
        assert!(session.get(IDENTITY_KEY).is_none());
    }

    #[test]
    fn inactive_principal_is_treated_as_unauthenticated() {
        let mut session = MemorySession::with_identity("mallory");
        let decision = chain().authorize(&mut session, "view.public").unwrap();
        assert!(matches!(decision, AuthDecision::Unauthenticated { .. }));
        assert!(session.get(IDENTITY_KEY).is_none());
    }

    #[test]
    fn granted_permission_attaches_principal_and_closure() {
        let mut session = MemorySession::with_identity("bob");
        session.set(ROLES_KEY, "mark");

        // view.public is owned by the base role; mark reaches it via closure.
        let decision = chain().authorize(&mut session, "view.public").unwrap();
        let AuthDecision::Authorized {
            principal,
            role_closure,
        } = decision
        else {
            panic!("expected Authorized");
        };
        assert_eq!(principal.id(), "bob");
        assert!(role_closure.contains("mark"));
        assert!(role_closure.contains("editor"));
        assert!(role_closure.contains("user"));
        assert!(!role_closure.contains("supermark"));
        assert!(session.get(IDENTITY_KEY).is_some());
    }

    #[test]
    fn insufficient_role_is_forbidden_and_clears_identity() {
        let mut session = MemorySession::with_identity("bob");
        session.set(ROLES_KEY, "mark");

        let decision = chain().authorize(&mut session, "system.admin").unwrap();
        assert_eq!(
            decision,
            AuthDecision::Forbidden {
                requirement: "system.admin".into()
            }
        );
        assert!(session.get(IDENTITY_KEY).is_none());
        assert!(session.get(ROLES_KEY).is_none());
    }

    #[test]
    fn strict_check_denies_mark_below_supermark() {
        let mut session = MemorySession::with_identity("bob");

        // bob passes the base publish check...
        assert!(chain()
            .authorize(&mut session, "content.publish")
            .unwrap()
            .is_authorized());

        // ...but the supermark-only sub-check still denies him.
        let decision = chain().require_role(&mut session, "supermark").unwrap();
        assert_eq!(
            decision,
            AuthDecision::Forbidden {
                requirement: "role:supermark".into()
            }
        );
    }

    #[test]
    fn outcome_kinds_cover_every_terminal_state() {
        let chain = chain();

        let mut anonymous = MemorySession::new();
        let unauthenticated = chain.authorize(&mut anonymous, "view.public").unwrap();
        assert_eq!(unauthenticated.kind().to_string(), "Unauthenticated");

        let mut session = MemorySession::with_identity("bob");
        let granted = chain.authorize(&mut session, "view.public").unwrap();
        assert_eq!(granted.kind().to_string(), "Authorized");

        let forbidden = chain.authorize(&mut session, "system.admin").unwrap();
        assert_eq!(forbidden.kind().to_string(), "Forbidden");
    }

    #[test]
    fn strict_check_admits_supermark() {
        let mut session = MemorySession::with_identity("alice");
        let decision = chain().require_role(&mut session, "supermark").unwrap();
        assert!(decision.is_authorized());
    }
}
