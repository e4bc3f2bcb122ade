//! Authorization chain outcomes.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumDiscriminants};
use utoipa::ToSchema;

use super::principal::Principal;

/// Outcome of a pass through the authorization chain.
///
/// Outcomes are data, not errors: the embedding handler maps
/// `Unauthenticated` to a redirect (or 401 on API routes) and `Forbidden`
/// to 403, while `Authorized` carries the principal and its expanded role
/// closure for downstream handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, EnumDiscriminants)]
#[strum_discriminants(name(AuthDecisionKind), derive(StrumDisplay))]
pub enum AuthDecision {
    Authorized {
        principal: Principal,
        role_closure: BTreeSet<String>,
    },
    Unauthenticated {
        login_route: String,
    },
    Forbidden {
        /// The permission key or `role:<name>` requirement that was not met.
        requirement: String,
    },
}

impl AuthDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthDecision::Authorized { .. })
    }

    pub fn kind(&self) -> AuthDecisionKind {
        AuthDecisionKind::from(self)
    }
}

impl Display for AuthDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AuthDecision::Authorized { principal, .. } => write!(f, "Authorized({principal})"),
            AuthDecision::Unauthenticated { login_route } => {
                write!(f, "Unauthenticated(redirect={login_route})")
            }
            AuthDecision::Forbidden { requirement } => write!(f, "Forbidden({requirement})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_match_variants() {
        let d = AuthDecision::Unauthenticated {
            login_route: "/login".into(),
        };
        assert_eq!(d.kind().to_string(), "Unauthenticated");
        assert!(!d.is_authorized());
    }
}
