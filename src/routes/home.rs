use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::content::{fetch_posts, FeedMode, PostView};
use crate::engagement;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/post/{id}", get(show_post))
}

#[derive(Serialize)]
pub struct Feed {
    pub viewer_id: Option<String>,
    pub posts: Vec<PostView>,
}

#[derive(Serialize)]
pub struct PostPage {
    pub post: PostView,
    pub viewer_liked: bool,
}

/// GET /: Every post, newest first.
async fn index(user: MaybeUser) -> AppResult<Json<Feed>> {
    let posts = fetch_posts(user.backend.as_ref(), &FeedMode::Home, Utc::now()).await?;
    Ok(Json(Feed {
        viewer_id: user.id().map(str::to_string),
        posts,
    }))
}

/// GET /post/{id}
async fn show_post(user: MaybeUser, Path(id): Path<i64>) -> AppResult<Json<PostPage>> {
    let backend = user.backend.as_ref();
    let post = fetch_posts(backend, &FeedMode::Post(id), Utc::now())
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("post"))?;

    let viewer_liked = match user.id() {
        Some(viewer) => engagement::is_liked(backend, viewer, id).await?,
        None => false,
    };

    Ok(Json(PostPage { post, viewer_liked }))
}
