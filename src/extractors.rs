use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::session::RequestSession;
use crate::backend::{Backend, Identity};
use crate::error::AppError;

fn request_session(parts: &Parts) -> Result<RequestSession, AppError> {
    parts
        .extensions
        .get::<RequestSession>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session middleware is not installed".into()))
}

/// The authenticated caller and a backend handle bound to their token.
/// Rejects with 401 when the request resolved anonymously.
#[derive(Clone)]
pub struct CurrentUser {
    pub identity: Identity,
    pub backend: Arc<dyn Backend>,
    pub access_token: Option<String>,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.identity.id
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = request_session(parts)?;
        match session.identity {
            Some(identity) => Ok(CurrentUser {
                identity,
                backend: session.backend,
                access_token: session.access_token,
            }),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Optional user extractor. Carries the (possibly anonymous) backend handle
/// for routes that work either way.
#[derive(Clone)]
pub struct MaybeUser {
    pub identity: Option<Identity>,
    pub backend: Arc<dyn Backend>,
    pub access_token: Option<String>,
}

impl MaybeUser {
    pub fn id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = request_session(parts)?;
        Ok(MaybeUser {
            identity: session.identity,
            backend: session.backend,
            access_token: session.access_token,
        })
    }
}
