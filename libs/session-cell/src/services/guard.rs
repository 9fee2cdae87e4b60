// libs/session-cell/src/services/guard.rs
// Session continuity guard. Provisioning a new identity signs that identity
// in on the shared auth channel, so the guard snapshots the operator's
// session, suspends its own listener for the duration of the call, restores
// the snapshot, and verifies the restored session really belongs to the
// operator before going back to idle.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, instrument, warn};

use shared_utils::jwt::{token_subject, validate_token};

use crate::error::SessionError;
use crate::models::{
    AdoptSessionRequest, GuardState, OperatorSession, ProvisionRequest, ProvisionedIdentity,
    SessionChange, SessionSnapshot, SessionTokens,
};
use crate::services::gateway::IdentityGateway;

struct GuardInner {
    state: GuardState,
    active: Option<OperatorSession>,
    snapshot: Option<SessionSnapshot>,
    // User id of the most recently provisioned identity. Its broadcast can
    // arrive after the suspend window already closed, so the listener drops
    // it by id, not only by state.
    provisioned: Option<String>,
}

/// Clones share the guard state, so the HTTP handlers and the spawned
/// change listener all see the same session.
pub struct SessionGuardService {
    gateway: Arc<dyn IdentityGateway>,
    changes: broadcast::Sender<SessionChange>,
    inner: Arc<RwLock<GuardInner>>,
    jwt_secret: String,
}

impl SessionGuardService {
    pub fn new(
        gateway: Arc<dyn IdentityGateway>,
        changes: broadcast::Sender<SessionChange>,
        jwt_secret: String,
    ) -> Self {
        Self {
            gateway,
            changes,
            inner: Arc::new(RwLock::new(GuardInner {
                state: GuardState::Idle,
                active: None,
                snapshot: None,
                provisioned: None,
            })),
            jwt_secret,
        }
    }

    fn set_state(inner: &mut GuardInner, target: GuardState) -> Result<(), SessionError> {
        if !inner.state.can_transition_to(&target) {
            return Err(SessionError::InvalidStateTransition {
                from: inner.state.to_string(),
                to: target.to_string(),
            });
        }

        debug!("Session guard {} -> {}", inner.state, target);
        inner.state = target;
        Ok(())
    }

    // ========================================================================
    // SESSION LIFECYCLE
    // ========================================================================

    /// Takes ownership of a session the operator obtained from the auth
    /// gateway. The token is validated here because adoption is the one
    /// entry point that cannot sit behind the auth middleware.
    pub async fn adopt_session(
        &self,
        request: AdoptSessionRequest,
    ) -> Result<OperatorSession, SessionError> {
        let user = validate_token(&request.access_token, &self.jwt_secret)
            .map_err(SessionError::InvalidToken)?;

        let mut inner = self.inner.write().await;
        match inner.state {
            GuardState::Idle => {}
            GuardState::Failed => return Err(SessionError::GuardFailed),
            GuardState::Suspended | GuardState::Verifying => {
                return Err(SessionError::ProvisioningInProgress)
            }
        }

        let session = OperatorSession {
            user,
            tokens: SessionTokens {
                access_token: request.access_token,
                refresh_token: request.refresh_token,
            },
        };
        inner.active = Some(session.clone());
        drop(inner);

        info!("Adopted operator session for user {}", session.user.id);
        Ok(session)
    }

    pub async fn current_session(&self) -> Option<OperatorSession> {
        let inner = self.inner.read().await;
        inner.active.clone()
    }

    pub async fn state(&self) -> GuardState {
        let inner = self.inner.read().await;
        inner.state
    }

    /// The only way back to idle after a failed restore. Clears the suspect
    /// active session; the operator has to adopt a fresh one.
    pub async fn reset(&self) -> Result<GuardState, SessionError> {
        let mut inner = self.inner.write().await;
        match inner.state {
            GuardState::Idle => Ok(GuardState::Idle),
            GuardState::Failed => {
                inner.active = None;
                inner.snapshot = None;
                inner.provisioned = None;
                Self::set_state(&mut inner, GuardState::Idle)?;
                warn!("Session guard reset after failed restore");
                Ok(GuardState::Idle)
            }
            GuardState::Suspended | GuardState::Verifying => {
                Err(SessionError::ProvisioningInProgress)
            }
        }
    }

    // ========================================================================
    // PROVISIONING
    // ========================================================================

    /// Creates a new identity through the gateway while keeping the
    /// operator signed in. Exactly one provisioning call fits in the
    /// suspend window; completion or failure of that call drives every
    /// state change, never a timer.
    pub async fn provision_identity(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionedIdentity, SessionError> {
        let snapshot = {
            let mut inner = self.inner.write().await;
            match inner.state {
                GuardState::Idle => {}
                GuardState::Failed => return Err(SessionError::GuardFailed),
                GuardState::Suspended | GuardState::Verifying => {
                    return Err(SessionError::ProvisioningInProgress)
                }
            }
            let Some(active) = inner.active.clone() else {
                return Err(SessionError::NoActiveSession);
            };

            let snapshot = SessionSnapshot {
                session: active,
                taken_at: Utc::now(),
            };
            inner.snapshot = Some(snapshot.clone());
            Self::set_state(&mut inner, GuardState::Suspended)?;
            snapshot
        };

        info!(
            "Session guard suspended while provisioning identity for {}",
            request.email
        );

        let (identity, _tokens) = match self.gateway.create_identity(&request).await {
            Ok(created) => created,
            Err(e) => {
                let mut inner = self.inner.write().await;
                inner.snapshot = None;
                Self::set_state(&mut inner, GuardState::Idle)?;
                warn!("Identity provisioning aborted, guard back to idle: {}", e);
                return Err(e);
            }
        };

        let mut inner = self.inner.write().await;
        Self::set_state(&mut inner, GuardState::Verifying)?;
        inner.provisioned = Some(identity.user_id.clone());
        inner.active = Some(snapshot.session.clone());

        let operator_id = snapshot.session.user.id.clone();
        match token_subject(&snapshot.session.tokens.access_token, &self.jwt_secret) {
            Ok(subject) if subject == operator_id => {
                inner.snapshot = None;
                Self::set_state(&mut inner, GuardState::Idle)?;
                info!(
                    "Operator {} session restored after provisioning {}",
                    operator_id, identity.email
                );
                Ok(identity)
            }
            Ok(subject) => {
                Self::set_state(&mut inner, GuardState::Failed)?;
                error!(
                    "Restored session belongs to {} instead of operator {}",
                    subject, operator_id
                );
                Err(SessionError::RestoreMismatch {
                    expected: operator_id,
                    found: subject,
                })
            }
            Err(e) => {
                Self::set_state(&mut inner, GuardState::Failed)?;
                error!("Restored session token failed validation: {}", e);
                Err(SessionError::RestoreMismatch {
                    expected: operator_id,
                    found: format!("invalid token ({})", e),
                })
            }
        }
    }

    // ========================================================================
    // CHANGE LISTENER
    // ========================================================================

    /// Consumes the shared session change feed. Changes are applied to the
    /// active session only while the guard is idle, and the broadcast for
    /// a freshly provisioned identity is dropped by id even when it is
    /// delivered after the suspend window already closed.
    #[instrument(skip(self))]
    pub async fn listen(self) {
        let mut changes = self.changes.subscribe();
        info!("Session guard listening for session changes");

        loop {
            match changes.recv().await {
                Ok(change) => self.apply_change(change).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Session guard lagged, {} session changes skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Session change feed closed, guard listener stopping");
                    break;
                }
            }
        }
    }

    async fn apply_change(&self, change: SessionChange) {
        let mut inner = self.inner.write().await;
        if inner.provisioned.as_deref() == Some(change.user_id.as_str()) {
            info!(
                "Dropping session change for provisioned identity {}",
                change.user_id
            );
            return;
        }
        if inner.state != GuardState::Idle {
            warn!(
                "Ignoring session change for user {} while guard is {}",
                change.user_id, inner.state
            );
            return;
        }

        match validate_token(&change.tokens.access_token, &self.jwt_secret) {
            Ok(user) => {
                info!("Applying session change for user {}", user.id);
                inner.active = Some(OperatorSession {
                    user,
                    tokens: change.tokens,
                });
            }
            Err(e) => {
                warn!(
                    "Ignoring session change for user {} with invalid token: {}",
                    change.user_id, e
                );
            }
        }
    }
}

impl Clone for SessionGuardService {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            changes: self.changes.clone(),
            inner: Arc::clone(&self.inner),
            jwt_secret: self.jwt_secret.clone(),
        }
    }
}
