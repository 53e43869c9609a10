use axum::extract::{Form, State};
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::cookies;
use crate::backend::{AuthSession, BackendError};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::profile;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl CredentialsForm {
    fn required(self) -> AppResult<(String, String)> {
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::validation("email", "is required"))?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("password", "is required"))?;
        Ok((email, password))
    }
}

#[derive(Deserialize)]
pub struct ConfirmForm {
    pub token: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SignedIn {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

#[derive(Serialize)]
pub struct SignUpPending {
    pub status: &'static str,
    pub email: String,
}

fn with_session_cookies(session: &AuthSession, body: SignedIn) -> Response {
    let [access, refresh] = cookies::session_cookies(&session.access_token, &session.refresh_token);
    (
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, access), (header::SET_COOKIE, refresh)]),
        Json(body),
    )
        .into_response()
}

/// Bad credentials are the caller's problem, not a server fault.
fn credentials_error(e: BackendError) -> AppError {
    match e {
        BackendError::Auth(message) => AppError::Auth(message),
        other => other.into(),
    }
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let (email, password) = form.required()?;

    let session = state
        .connector
        .anonymous()
        .sign_in(&email, &password)
        .await
        .map_err(credentials_error)?;

    let backend = state.connector.for_token(&session.access_token);
    let user = profile::ensure_profile(backend.as_ref(), &session.identity).await?;
    tracing::info!(user_id = %user.id, "signed in");

    let body = SignedIn {
        user_id: user.id,
        email: session.identity.email.clone(),
        username: user.username,
    };
    Ok(with_session_cookies(&session, body))
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let (email, password) = form.required()?;

    let pending = state
        .connector
        .anonymous()
        .sign_up(&email, &password)
        .await
        .map_err(|e| match e {
            BackendError::Conflict(message) => AppError::Conflict(message),
            other => credentials_error(other),
        })?;
    tracing::info!(identity_id = %pending.id, "sign-up awaiting confirmation");

    Ok((
        StatusCode::ACCEPTED,
        Json(SignUpPending {
            status: "confirmation_required",
            email: pending.email,
        }),
    )
        .into_response())
}

/// POST /confirm-account
///
/// Confirms the identity, signs it in and creates its user row with a
/// generated username.
pub async fn confirm_account(
    State(state): State<AppState>,
    Form(form): Form<ConfirmForm>,
) -> AppResult<Response> {
    let token = form
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::validation("token", "is required"))?;

    let session = state
        .connector
        .anonymous()
        .confirm_sign_up(token.trim())
        .await
        .map_err(credentials_error)?;

    let backend = state.connector.for_token(&session.access_token);
    let user = profile::ensure_profile(backend.as_ref(), &session.identity).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "account confirmed");

    let body = SignedIn {
        user_id: user.id,
        email: session.identity.email.clone(),
        username: user.username,
    };
    Ok(with_session_cookies(&session, body))
}

/// GET /logout
pub async fn logout(user: MaybeUser) -> Response {
    if let Some(token) = user.access_token.as_deref() {
        if let Err(e) = user.backend.sign_out(token).await {
            tracing::warn!(error = %e, "sign-out failed, clearing cookies anyway");
        }
    }

    let [access, refresh] = cookies::clear_session_cookies();
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/".to_string())],
        AppendHeaders([(header::SET_COOKIE, access), (header::SET_COOKIE, refresh)]),
        "",
    )
        .into_response()
}
