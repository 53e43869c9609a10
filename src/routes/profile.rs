use axum::extract::{Form, Multipart, Path};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::content::{fetch_posts, FeedMode, PostView};
use crate::db::models::User;
use crate::engagement::{self, FollowOutcome};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::profile::{self, ProfileUpdate};
use crate::routes::form::MultipartForm;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", post(update))
        .route("/profile/{handle}", get(show))
        .route("/follow", post(follow))
}

#[derive(Serialize)]
pub struct ProfilePage {
    pub user: User,
    pub posts: Vec<PostView>,
    pub followers: u64,
    pub following: u64,
    pub total_likes: u64,
    pub viewer_follows: bool,
    pub is_self: bool,
}

#[derive(Deserialize)]
pub struct FollowForm {
    pub user_id: Option<String>,
}

/// GET /profile/@{username}
async fn show(user: MaybeUser, Path(handle): Path<String>) -> AppResult<Json<ProfilePage>> {
    let username = handle
        .strip_prefix('@')
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::not_found("user"))?;

    let backend = user.backend.as_ref();
    let subject = profile::find_by_username(backend, username).await?;

    let mode = FeedMode::Profile(subject.id.clone());
    let (posts, followers, following, total_likes) = futures::try_join!(
        fetch_posts(backend, &mode, Utc::now()),
        engagement::follower_count(backend, &subject.id),
        engagement::following_count(backend, &subject.id),
        engagement::total_likes(backend, &subject.id),
    )?;

    let is_self = user.id() == Some(subject.id.as_str());
    let viewer_follows = match user.id() {
        Some(viewer) if !is_self => engagement::is_following(backend, viewer, &subject.id).await?,
        _ => false,
    };

    Ok(Json(ProfilePage {
        user: subject,
        posts,
        followers,
        following,
        total_likes,
        viewer_follows,
        is_self,
    }))
}

/// POST /profile: Change username, bio or avatar. Absent fields are left
/// as they are.
async fn update(user: CurrentUser, multipart: Multipart) -> AppResult<Json<User>> {
    let mut form = MultipartForm::read(multipart).await?;
    let backend = user.backend.as_ref();

    profile::ensure_profile(backend, &user.identity).await?;
    let update = ProfileUpdate {
        username: form.text("username"),
        bio: form.raw("bio").map(str::to_string),
        avatar: form.take_file("avatar"),
    };
    let updated = profile::update_profile(backend, user.id(), update).await?;
    tracing::info!(user_id = %updated.id, username = %updated.username, "updated profile");

    Ok(Json(updated))
}

/// POST /follow: Toggle following `user_id`.
async fn follow(user: CurrentUser, Form(form): Form<FollowForm>) -> AppResult<Json<FollowOutcome>> {
    let target = form
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("user_id", "is required"))?;

    let backend = user.backend.as_ref();
    profile::ensure_profile(backend, &user.identity).await?;
    let outcome = engagement::toggle_follow(backend, user.id(), &target).await?;
    Ok(Json(outcome))
}
