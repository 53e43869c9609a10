//! Per-request session resolution.
//!
//! Resolution never fails. A rejected access token falls back to the
//! refresh token, and a rejected refresh token degrades the request to
//! anonymous. Routes that need a user reject anonymous requests themselves
//! (see [`crate::extractors::CurrentUser`]).

use std::fmt;
use std::sync::Arc;

use crate::auth::cookies;
use crate::backend::{Backend, Connector, Identity};

/// How the identity for a request was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No session cookies were sent.
    Anonymous,
    /// The access token was valid.
    Authenticated,
    /// The access token was missing or rejected; the refresh token minted a
    /// new pair.
    Refreshed,
    /// Cookies were sent but neither token was accepted.
    Invalid,
}

/// The identity and backend handle attached to one request.
#[derive(Clone)]
pub struct RequestSession {
    pub identity: Option<Identity>,
    pub outcome: SessionOutcome,
    /// Bound to `access_token`, or anonymous when there is none.
    pub backend: Arc<dyn Backend>,
    pub access_token: Option<String>,
}

impl fmt::Debug for RequestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSession")
            .field("identity", &self.identity)
            .field("outcome", &self.outcome)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RequestSession {
    pub fn anonymous(connector: &dyn Connector, outcome: SessionOutcome) -> Self {
        Self {
            identity: None,
            outcome,
            backend: connector.anonymous(),
            access_token: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub session: RequestSession,
    /// Empty, or the access and refresh cookies for a refreshed pair.
    pub set_cookies: Vec<String>,
}

pub async fn resolve(
    connector: &dyn Connector,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> Resolution {
    if access_token.is_none() && refresh_token.is_none() {
        return Resolution {
            session: RequestSession::anonymous(connector, SessionOutcome::Anonymous),
            set_cookies: Vec::new(),
        };
    }

    if let Some(token) = access_token {
        match connector.anonymous().verify_access_token(token).await {
            Ok(identity) => {
                return Resolution {
                    session: RequestSession {
                        identity: Some(identity),
                        outcome: SessionOutcome::Authenticated,
                        backend: connector.for_token(token),
                        access_token: Some(token.to_string()),
                    },
                    set_cookies: Vec::new(),
                };
            }
            Err(e) => tracing::debug!(error = %e, "access token rejected"),
        }
    }

    if let Some(token) = refresh_token {
        match connector.anonymous().refresh_session(token).await {
            Ok(session) => {
                // The refresh response already carries the identity, so the
                // new access token is not verified a second time.
                tracing::debug!(user_id = %session.identity.id, "session refreshed");
                return Resolution {
                    set_cookies: cookies::session_cookies(
                        &session.access_token,
                        &session.refresh_token,
                    )
                    .to_vec(),
                    session: RequestSession {
                        backend: connector.for_token(&session.access_token),
                        identity: Some(session.identity),
                        outcome: SessionOutcome::Refreshed,
                        access_token: Some(session.access_token),
                    },
                };
            }
            Err(e) => tracing::warn!(error = %e, "session refresh failed, continuing anonymously"),
        }
    }

    Resolution {
        session: RequestSession::anonymous(connector, SessionOutcome::Invalid),
        set_cookies: Vec::new(),
    }
}
