//! Super-admin impersonation ("acting as") sessions.
//!
//! A session is created only by the admin console, after it has verified the
//! actor is a super-admin; nothing here re-checks that. The session survives a
//! reload through an [`ImpersonationStore`] and ends on explicit exit or when
//! the actor signs out.
//!
//! While active, the session replaces the actor's own tenant resolution for
//! every access decision. It grants no extra role inside the target tenant:
//! the effective role is whatever the target user holds.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use posgate_core::{TenantId, UserId};
use posgate_events::{AuditEvent, AuditKind, AuditOutcome, AuditSink};

/// Environment variable naming the file that persists the active session.
pub const IMPERSONATION_FILE_ENV: &str = "POSGATE_IMPERSONATION_FILE";

const CONSOLE_PATH: &str = "/admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationSession {
    /// Kept for audit; the super-admin who started the session.
    pub actor_super_admin_id: UserId,
    pub target_tenant_id: TenantId,
    pub target_user_id: UserId,
    /// Business name at the time the session started (display only).
    pub business_name_snapshot: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ImpersonationState {
    #[default]
    Inactive,
    Active(ImpersonationSession),
}

impl ImpersonationState {
    pub fn is_active(&self) -> bool {
        matches!(self, ImpersonationState::Active(_))
    }

    pub fn session(&self) -> Option<&ImpersonationSession> {
        match self {
            ImpersonationState::Active(session) => Some(session),
            ImpersonationState::Inactive => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImpersonationError {
    #[error("failed to persist impersonation session: {0:#}")]
    Persistence(anyhow::Error),
}

/// Persistence for the active session across reloads.
pub trait ImpersonationStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<ImpersonationSession>>;
    fn save(&self, session: &ImpersonationSession) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Process-local store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryImpersonationStore {
    slot: Mutex<Option<ImpersonationSession>>,
}

impl InMemoryImpersonationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImpersonationStore for InMemoryImpersonationStore {
    fn load(&self) -> anyhow::Result<Option<ImpersonationSession>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("impersonation store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&self, session: &ImpersonationSession) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("impersonation store lock poisoned"))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("impersonation store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// JSON file store; the file exists only while a session is active.
#[derive(Debug, Clone)]
pub struct FileImpersonationStore {
    path: PathBuf,
}

impl FileImpersonationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `POSGATE_IMPERSONATION_FILE`, or a file in the temp dir.
    pub fn from_env() -> Self {
        let path = std::env::var(IMPERSONATION_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let fallback = std::env::temp_dir().join("posgate-impersonation.json");
                tracing::warn!(path = ?fallback, "{IMPERSONATION_FILE_ENV} not set; using temp dir");
                fallback
            });
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImpersonationStore for FileImpersonationStore {
    fn load(&self) -> anyhow::Result<Option<ImpersonationSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read impersonation session at {:?}", self.path))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt impersonation session at {:?}", self.path))?;
        Ok(Some(session))
    }

    fn save(&self, session: &ImpersonationSession) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {:?}", parent))?;
        }
        let raw = serde_json::to_string(session).context("failed to serialize impersonation session")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write impersonation session at {:?}", self.path))
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove impersonation session at {:?}", self.path)),
        }
    }
}

/// Owner of the process-wide impersonation state.
///
/// Readers get a cloned [`ImpersonationState`] to thread into access
/// decisions; only `start`, `exit` and `actor_signed_out` mutate it.
pub struct ImpersonationHolder {
    state: RwLock<ImpersonationState>,
    store: Arc<dyn ImpersonationStore>,
    audit: Arc<dyn AuditSink>,
}

impl ImpersonationHolder {
    /// Rebuild state from the store. An unreadable store yields no session.
    pub fn restore(store: Arc<dyn ImpersonationStore>, audit: Arc<dyn AuditSink>) -> Self {
        let state = match store.load() {
            Ok(Some(session)) => {
                tracing::info!(
                    actor_id = %session.actor_super_admin_id,
                    tenant_id = %session.target_tenant_id,
                    "restored impersonation session"
                );
                ImpersonationState::Active(session)
            }
            Ok(None) => ImpersonationState::Inactive,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "could not restore impersonation session");
                ImpersonationState::Inactive
            }
        };

        Self {
            state: RwLock::new(state),
            store,
            audit,
        }
    }

    pub fn current(&self) -> ImpersonationState {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Begin acting as `target_user_id` inside `target_tenant_id`.
    ///
    /// The caller must already have proven `actor_id` is a super-admin. Starting
    /// while another session is active replaces it.
    pub fn start(
        &self,
        actor_id: UserId,
        target_tenant_id: TenantId,
        target_user_id: UserId,
        business_name_snapshot: impl Into<String>,
    ) -> Result<ImpersonationSession, ImpersonationError> {
        let session = ImpersonationSession {
            actor_super_admin_id: actor_id,
            target_tenant_id,
            target_user_id,
            business_name_snapshot: business_name_snapshot.into(),
            started_at: Utc::now(),
        };

        self.store.save(&session).map_err(ImpersonationError::Persistence)?;

        if let Ok(mut state) = self.state.write() {
            *state = ImpersonationState::Active(session.clone());
        }

        tracing::info!(
            %actor_id,
            tenant_id = %target_tenant_id,
            %target_user_id,
            "impersonation started"
        );
        self.audit.record(
            AuditEvent::new(AuditKind::ImpersonationStarted, Some(actor_id), CONSOLE_PATH, AuditOutcome::Granted)
                .with_target_tenant(target_tenant_id),
        );

        Ok(session)
    }

    /// End the active session. Idempotent.
    pub fn exit(&self) {
        let ended = match self.state.write() {
            Ok(mut state) => std::mem::take(&mut *state),
            Err(_) => ImpersonationState::Inactive,
        };

        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %format!("{err:#}"), "failed to clear persisted impersonation session");
        }

        if let ImpersonationState::Active(session) = ended {
            tracing::info!(
                actor_id = %session.actor_super_admin_id,
                tenant_id = %session.target_tenant_id,
                "impersonation ended"
            );
            self.audit.record(
                AuditEvent::new(
                    AuditKind::ImpersonationEnded,
                    Some(session.actor_super_admin_id),
                    CONSOLE_PATH,
                    AuditOutcome::Granted,
                )
                .with_target_tenant(session.target_tenant_id),
            );
        }
    }

    /// Tear down the session if `user_id` is its actor. Returns whether it did.
    pub fn actor_signed_out(&self, user_id: UserId) -> bool {
        let is_actor = self
            .current()
            .session()
            .is_some_and(|s| s.actor_super_admin_id == user_id);
        if is_actor {
            self.exit();
        }
        is_actor
    }
}

impl core::fmt::Debug for ImpersonationHolder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImpersonationHolder")
            .field("state", &self.current())
            .finish_non_exhaustive()
    }
}
