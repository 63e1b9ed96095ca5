//! Global access gate.
//!
//! Decides whether the protected console may render, from two external
//! signals: the permission provider and the session provider. The gate
//! keeps no state of its own; every decision is recomputed from the inputs.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Permission name that allows viewing the site.
pub const VIEW_SITE: &str = "view_site";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub login: String,
}

/// Signal from the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub status: SessionStatus,
    pub user: Option<SessionUser>,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            user: None,
        }
    }

    pub fn authenticated(user: SessionUser) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(user),
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            user: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status != SessionStatus::Loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// Signal from the permission provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionState {
    pub can_view_site: bool,
    pub permissions_ready: bool,
    pub loading: bool,
}

impl PermissionState {
    pub fn loading() -> Self {
        Self {
            can_view_site: false,
            permissions_ready: false,
            loading: true,
        }
    }

    /// Resolved permissions derived from the granted permission names.
    pub fn from_grants<S: AsRef<str>>(grants: &[S]) -> Self {
        Self {
            can_view_site: grants.iter().any(|g| g.as_ref() == VIEW_SITE),
            permissions_ready: true,
            loading: false,
        }
    }

    fn is_resolved(&self) -> bool {
        self.permissions_ready && !self.loading
    }
}

/// `permissions_ready && auth_resolved && has_view_permission`.
pub fn can_view_site(permissions: &PermissionState, session: &SessionState) -> bool {
    permissions.is_resolved() && session.is_resolved() && permissions.can_view_site
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Permission or session data not yet available.
    Resolving,
    /// Both resolved, no permission to view the site.
    Denied { can_sign_out: bool },
    Granted,
}

impl GateState {
    pub fn evaluate(permissions: &PermissionState, session: &SessionState) -> Self {
        if !permissions.is_resolved() || !session.is_resolved() {
            GateState::Resolving
        } else if can_view_site(permissions, session) {
            GateState::Granted
        } else {
            GateState::Denied {
                can_sign_out: session.is_authenticated(),
            }
        }
    }
}

/// Action offered on the access-denied view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Reload and check again.
    Retry,
    SignOut,
}

/// What the gate renders in place of, or as, the protected subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView<T> {
    Loading,
    Denied { actions: Vec<GateAction> },
    Content(T),
}

impl<T> GateView<T> {
    pub fn content(self) -> Option<T> {
        match self {
            GateView::Content(content) => Some(content),
            _ => None,
        }
    }
}

pub struct AccessGate;

impl AccessGate {
    /// Render the protected subtree only when access is granted. `children`
    /// is not called otherwise.
    pub fn render<T>(
        permissions: &PermissionState,
        session: &SessionState,
        children: impl FnOnce() -> T,
    ) -> GateView<T> {
        match GateState::evaluate(permissions, session) {
            GateState::Resolving => GateView::Loading,
            GateState::Denied { can_sign_out } => {
                let mut actions = vec![GateAction::Retry];
                if can_sign_out {
                    actions.push(GateAction::SignOut);
                }
                GateView::Denied { actions }
            }
            GateState::Granted => GateView::Content(children()),
        }
    }

    /// Follow both signals and publish the gate state whenever either
    /// changes. The task ends when both senders are gone.
    pub fn watch(
        mut permissions: watch::Receiver<PermissionState>,
        mut session: watch::Receiver<SessionState>,
    ) -> watch::Receiver<GateState> {
        let initial =
            GateState::evaluate(&permissions.borrow_and_update(), &session.borrow_and_update());
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            let mut permissions_open = true;
            let mut session_open = true;
            while permissions_open || session_open {
                tokio::select! {
                    changed = permissions.changed(), if permissions_open => {
                        permissions_open = changed.is_ok();
                    }
                    changed = session.changed(), if session_open => {
                        session_open = changed.is_ok();
                    }
                    _ = tx.closed() => break,
                }
                let next = GateState::evaluate(
                    &permissions.borrow_and_update(),
                    &session.borrow_and_update(),
                );
                tx.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    tracing::debug!("Access gate: {:?} -> {:?}", current, next);
                    *current = next;
                    true
                });
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: "1".into(),
            login: "admin".into(),
        }
    }

    #[test]
    fn test_resolving_until_permissions_ready() {
        let state = GateState::evaluate(
            &PermissionState::loading(),
            &SessionState::authenticated(user()),
        );
        assert_eq!(state, GateState::Resolving);
    }

    #[test]
    fn test_resolving_until_session_resolved() {
        let state = GateState::evaluate(
            &PermissionState::from_grants(&[VIEW_SITE]),
            &SessionState::loading(),
        );
        assert_eq!(state, GateState::Resolving);
    }

    #[test]
    fn test_denied_guest_cannot_sign_out() {
        let state = GateState::evaluate(
            &PermissionState::from_grants::<&str>(&[]),
            &SessionState::unauthenticated(),
        );
        assert_eq!(state, GateState::Denied { can_sign_out: false });
    }

    #[test]
    fn test_granted() {
        let state = GateState::evaluate(
            &PermissionState::from_grants(&["add_post", VIEW_SITE]),
            &SessionState::unauthenticated(),
        );
        assert_eq!(state, GateState::Granted);
    }

    #[test]
    fn test_can_view_site_requires_ready() {
        let permissions = PermissionState {
            can_view_site: true,
            permissions_ready: false,
            loading: false,
        };
        assert!(!can_view_site(&permissions, &SessionState::unauthenticated()));
    }

    #[test]
    fn test_render_denied_actions() {
        let view = AccessGate::render(
            &PermissionState::from_grants::<&str>(&[]),
            &SessionState::authenticated(user()),
            || "dashboard",
        );
        assert_eq!(
            view,
            GateView::Denied {
                actions: vec![GateAction::Retry, GateAction::SignOut]
            }
        );
    }

    #[test]
    fn test_render_skips_children_unless_granted() {
        let mut called = false;
        let view = AccessGate::render(&PermissionState::loading(), &SessionState::loading(), || {
            called = true;
        });
        assert_eq!(view, GateView::Loading);
        assert!(!called);
    }

    #[test]
    fn test_permission_state_deserializes_camel_case() {
        let body = r#"{"canViewSite": true, "permissionsReady": true, "loading": false}"#;
        let state: PermissionState = serde_json::from_str(body).unwrap();
        assert!(state.can_view_site && state.permissions_ready);
    }
}
