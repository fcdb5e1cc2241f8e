//! # Route Guard
//!
//! Pure, per-navigation authorization decisions. The guard holds no state of
//! its own: every evaluation takes a fresh [`SessionSnapshot`], so a session
//! change is reflected on the very next navigation.

use tracing::debug;

use crate::types::{Role, SessionSnapshot};

/// Outcome of evaluating a navigation against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hydration has not finished; render a waiting state, do not redirect.
    Pending,
    /// Not signed in. The requested path is preserved so the host can return
    /// the user there after login.
    RedirectToLogin { requested: String },
    /// Signed in, but the role is not allowed here; send the user to their
    /// default landing area instead.
    RedirectToDefault,
    /// Access granted.
    Permit,
}

/// Evaluate a navigation.
///
/// An empty `allowed_roles` slice means the route only requires a session,
/// not a particular role. Ordering of the checks is load-bearing: the
/// loading gate comes first so hydration never misredirects a restored
/// session, and authentication is settled before any role comparison.
pub fn evaluate(
    snapshot: &SessionSnapshot,
    requested_path: &str,
    allowed_roles: &[Role],
) -> RouteDecision {
    if snapshot.is_loading {
        return RouteDecision::Pending;
    }

    let Some(role) = snapshot.role() else {
        debug!(path = requested_path, "Unauthenticated navigation");
        return RouteDecision::RedirectToLogin {
            requested: requested_path.to_string(),
        };
    };

    if !allowed_roles.is_empty() && !allowed_roles.contains(&role) {
        debug!(path = requested_path, role = %role, "Role not allowed here");
        return RouteDecision::RedirectToDefault;
    }

    RouteDecision::Permit
}
