//! Current authentication state.
//!
//! `initialized` distinguishes "still bootstrapping the session" from "no
//! user". While it is `false`, every access check must wait.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use posgate_core::UserId;
use posgate_events::{EventBus, InMemoryEventBus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Option<UserId>,
    /// Flips false→true once per session bootstrap and never reverts.
    pub initialized: bool,
    /// A sign-out has started but the user is still attached.
    pub signing_out: bool,
}

impl Identity {
    /// Session bootstrap has not finished.
    pub fn bootstrapping() -> Self {
        Self::default()
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            initialized: true,
            signing_out: false,
        }
    }

    pub fn signed_in(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            initialized: true,
            signing_out: false,
        }
    }
}

/// Supplier of the current identity. Reading it has no side effects.
pub trait IdentitySource: Send + Sync {
    fn current_identity(&self) -> Identity;
}

/// Notification published on every authentication change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum AuthChange {
    Initialized(Option<UserId>),
    SignedIn(UserId),
    SigningOut(UserId),
    SignedOut(UserId),
}

/// In-process session state backing [`IdentitySource`].
///
/// `subscribe()` is the `onAuthChange` hook: each subscriber receives every
/// change published after it subscribed.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    state: RwLock<Identity>,
    changes: InMemoryEventBus<AuthChange>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<AuthChange> {
        self.changes.subscribe()
    }

    /// Finish session bootstrap with whatever user the session store restored.
    ///
    /// Returns `false` if bootstrap already completed; the call is then ignored.
    pub fn complete_bootstrap(&self, user_id: Option<UserId>) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.initialized {
            return false;
        }
        *state = Identity {
            user_id,
            initialized: true,
            signing_out: false,
        };
        drop(state);

        tracing::debug!(?user_id, "session bootstrap complete");
        self.publish(AuthChange::Initialized(user_id));
        true
    }

    /// Attach a user. Signing in also completes bootstrap.
    pub fn sign_in(&self, user_id: UserId) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        if state.user_id == Some(user_id) && state.initialized && !state.signing_out {
            return;
        }
        *state = Identity::signed_in(user_id);
        drop(state);

        tracing::info!(%user_id, "signed in");
        self.publish(AuthChange::SignedIn(user_id));
    }

    /// Mark a sign-out as in progress. No-op without a user.
    pub fn begin_sign_out(&self) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(user_id) = state.user_id else {
            return;
        };
        if state.signing_out {
            return;
        }
        state.signing_out = true;
        drop(state);

        self.publish(AuthChange::SigningOut(user_id));
    }

    /// Detach the user. No-op without a user.
    pub fn sign_out(&self) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(user_id) = state.user_id.take() else {
            return;
        };
        state.signing_out = false;
        drop(state);

        tracing::info!(%user_id, "signed out");
        self.publish(AuthChange::SignedOut(user_id));
    }

    fn publish(&self, change: AuthChange) {
        if let Err(err) = self.changes.publish(change) {
            tracing::warn!(?change, error = %err, "failed to publish auth change");
        }
    }
}

impl IdentitySource for SessionIdentity {
    fn current_identity(&self) -> Identity {
        // A poisoned lock reads as "still bootstrapping", which blocks everything.
        self.state.read().map(|s| *s).unwrap_or_default()
    }
}
