use axum::extract::Form;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::engagement::{self, LikeOutcome};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::profile;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/like", post(toggle))
}

#[derive(Deserialize)]
pub struct LikeForm {
    pub post_id: Option<String>,
}

/// POST /like: Like the post, or unlike it if already liked.
async fn toggle(user: CurrentUser, Form(form): Form<LikeForm>) -> AppResult<Json<LikeOutcome>> {
    let post_id: i64 = form
        .post_id
        .as_deref()
        .map(str::trim)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| AppError::validation("post_id", "must be a post id"))?;

    let backend = user.backend.as_ref();
    profile::ensure_profile(backend, &user.identity).await?;
    let outcome = engagement::toggle_like(backend, user.id(), post_id).await?;
    Ok(Json(outcome))
}
