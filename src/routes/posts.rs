use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::backend::{decode, decode_all, encode, Direction, Query, Table};
use crate::db::models::{NewPost, Post, Tag, User};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::profile;
use crate::routes::form::MultipartForm;
use crate::state::AppState;
use crate::tags::{self, TagFailure};
use crate::uploads::THUMBNAILS;

pub const TITLE_MAX_LEN: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new().route("/modify", get(editor).post(create_post))
}

#[derive(Serialize)]
pub struct EditorContext {
    pub author: User,
    pub known_tags: Vec<String>,
}

#[derive(Serialize)]
pub struct CreatedPost {
    pub post: Post,
    pub tags: Vec<String>,
    pub tag_failures: Vec<TagFailure>,
}

/// GET /modify
///
/// The editor's context: the author and the tags already in use.
async fn editor(user: CurrentUser) -> AppResult<Json<EditorContext>> {
    let backend = user.backend.as_ref();
    let author = profile::ensure_profile(backend, &user.identity).await?;
    let known_tags = decode_all::<Tag>(
        backend
            .select(&Query::from(Table::Tags).order_by("name", Direction::Asc))
            .await?,
    )?
    .into_iter()
    .map(|t| t.name)
    .collect();

    Ok(Json(EditorContext { author, known_tags }))
}

/// POST /modify: Create a post. The thumbnail is stored first; tags are
/// linked after the post exists and failures there do not undo it.
async fn create_post(
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<CreatedPost>)> {
    let mut form = MultipartForm::read(multipart).await?;

    let title = form.required("title")?;
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::validation(
            "title",
            format!("must be at most {TITLE_MAX_LEN} characters"),
        ));
    }
    let content = form.required("content")?;
    let category = form.required("category")?;
    let lede = form.text("lede");
    let tag_names = tags::parse_tag_list(form.raw("tags").unwrap_or_default());

    let thumbnail = form
        .take_file("thumbnail")
        .ok_or_else(|| AppError::validation("thumbnail", "is required"))?;
    thumbnail.validate_image("thumbnail")?;

    let backend = user.backend.as_ref();
    // Posts reference the user row
    profile::ensure_profile(backend, &user.identity).await?;
    let stored = thumbnail.store(backend, THUMBNAILS).await?;

    let new_post = NewPost {
        user_id: user.id().to_string(),
        title,
        content,
        category,
        lede,
        thumbnail_url: Some(stored.url),
        filepath: Some(stored.path),
        created_at: Utc::now(),
    };
    let post: Post = decode(backend.insert(Table::Posts, encode(&new_post)?).await?)?;
    tracing::info!(post_id = post.id, user_id = %post.user_id, "created post");

    let report = tags::link_tags(backend, post.id, &tag_names).await;
    if !report.is_complete() {
        tracing::warn!(
            post_id = post.id,
            failed = report.failures.len(),
            "post created with unlinked tags"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatedPost {
            post,
            tags: report.linked.into_iter().map(|t| t.name).collect(),
            tag_failures: report.failures,
        }),
    ))
}
