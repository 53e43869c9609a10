//! User rows: creation on confirmation, lookup and profile edits.

use chrono::Utc;
use serde_json::json;

use crate::backend::{decode, decode_all, Backend, BackendError, Filter, Identity, Query, Row, Table};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::uploads::{Upload, AVATARS};
use crate::username;

pub const USERNAME_MAX_LEN: usize = 30;

pub async fn find_by_id(backend: &dyn Backend, id: &str) -> AppResult<Option<User>> {
    let rows = backend
        .select(&Query::from(Table::Users).filter(Filter::eq("id", id)).limit(1))
        .await?;
    Ok(decode_all::<User>(rows)?.into_iter().next())
}

pub async fn find_by_username(backend: &dyn Backend, username: &str) -> AppResult<User> {
    let rows = backend
        .select(
            &Query::from(Table::Users)
                .filter(Filter::eq("username", username))
                .limit(1),
        )
        .await?;
    decode_all::<User>(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("user"))
}

/// Returns the user row for a confirmed identity, creating it with a
/// generated username on first use. Safe to call repeatedly.
pub async fn ensure_profile(backend: &dyn Backend, identity: &Identity) -> AppResult<User> {
    if let Some(user) = find_by_id(backend, &identity.id).await? {
        return Ok(user);
    }

    let username = username::generate(backend).await?;
    let mut row = Row::new();
    row.insert("id".into(), json!(identity.id));
    row.insert("username".into(), json!(username));
    row.insert("created_at".into(), json!(Utc::now().to_rfc3339()));

    match backend.insert(Table::Users, row).await {
        Ok(row) => {
            tracing::info!(user_id = %identity.id, username = %username, "created user profile");
            Ok(decode(row)?)
        }
        // Another request created the profile first
        Err(BackendError::Conflict(_)) => find_by_id(backend, &identity.id)
            .await?
            .ok_or_else(|| AppError::Conflict("username is taken".into())),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<Upload>,
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() || username.len() > USERNAME_MAX_LEN {
        return Err(AppError::validation(
            "username",
            format!("must be 1 to {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(AppError::validation(
            "username",
            "may only contain lowercase letters, digits and underscores",
        ));
    }
    Ok(())
}

/// Applies a profile edit. A replaced avatar is left in storage for the
/// asset sweep to collect.
pub async fn update_profile(
    backend: &dyn Backend,
    user_id: &str,
    update: ProfileUpdate,
) -> AppResult<User> {
    let mut values = Row::new();

    if let Some(username) = update.username.map(|u| u.trim().to_lowercase()) {
        if !username.is_empty() {
            validate_username(&username)?;
            values.insert("username".into(), json!(username));
        }
    }
    if let Some(bio) = update.bio {
        values.insert("bio".into(), json!(bio.trim()));
    }
    if let Some(avatar) = update.avatar {
        avatar.validate_image("avatar")?;
        let stored = avatar.store(backend, AVATARS).await?;
        values.insert("image_url".into(), json!(stored.url));
        values.insert("filepath".into(), json!(stored.path));
    }

    if !values.is_empty() {
        let changed = backend
            .update(Table::Users, values, &[Filter::eq("id", user_id)])
            .await
            .map_err(|e| match e {
                BackendError::Conflict(_) => AppError::Conflict("username is taken".into()),
                other => other.into(),
            })?;
        if changed == 0 {
            return Err(AppError::not_found("user"));
        }
    }

    find_by_id(backend, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))
}
