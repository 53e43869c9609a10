//! Post listings in every mode, enriched with author, tags, like count and
//! a display time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::backend::{decode_all, Backend, BackendResult, Direction, Filter, Query, Row, Table};
use crate::db::models::{Post, User};
use crate::error::{AppError, AppResult};
use crate::tags;

use super::timefmt::time_label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMode {
    Home,
    /// Case-insensitive substring of the title.
    Search(String),
    /// Posts owned by this user id.
    Profile(String),
    Post(i64),
}

impl FeedMode {
    /// Builds a mode from its name and argument. Mode names come from code,
    /// never from users, so an unknown one is a configuration error.
    pub fn parse(mode: &str, arg: Option<&str>) -> AppResult<Self> {
        let required = |what: &str| {
            arg.map(str::to_string)
                .ok_or_else(|| AppError::Configuration(format!("feed mode {mode} needs a {what}")))
        };
        match mode {
            "home" => Ok(FeedMode::Home),
            "search" => Ok(FeedMode::Search(required("term")?)),
            "profile" => Ok(FeedMode::Profile(required("user id")?)),
            "post" => {
                let id = required("post id")?;
                let id = id
                    .parse()
                    .map_err(|_| AppError::Configuration(format!("invalid post id {id}")))?;
                Ok(FeedMode::Post(id))
            }
            other => Err(AppError::Configuration(format!("unknown feed mode {other}"))),
        }
    }

    fn query(&self) -> Query {
        let query = Query::from(Table::Posts).order_by("id", Direction::Desc);
        match self {
            FeedMode::Home => query,
            FeedMode::Search(term) => query.filter(Filter::contains("title", term)),
            FeedMode::Profile(user_id) => query.filter(Filter::eq("user_id", user_id.as_str())),
            FeedMode::Post(id) => query.filter(Filter::eq("id", *id)).limit(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostView {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub lede: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub time_label: String,
    pub tags: Vec<String>,
    pub like_count: u64,
}

/// Fetches the posts for `mode`, newest first.
pub async fn fetch_posts(
    backend: &dyn Backend,
    mode: &FeedMode,
    now: DateTime<Utc>,
) -> AppResult<Vec<PostView>> {
    if let FeedMode::Profile(user_id) = mode {
        let exists = backend
            .count(&Query::from(Table::Users).filter(Filter::eq("id", user_id.as_str())))
            .await?;
        if exists == 0 {
            return Err(AppError::not_found("user"));
        }
    }

    let posts: Vec<Post> = decode_all(backend.select(&mode.query()).await?)?;
    if posts.is_empty() {
        if let FeedMode::Post(_) = mode {
            return Err(AppError::not_found("post"));
        }
        return Ok(Vec::new());
    }

    enrich(backend, posts, now).await
}

async fn authors(backend: &dyn Backend, posts: &[Post]) -> BackendResult<HashMap<String, String>> {
    let mut ids: Vec<&str> = posts.iter().map(|p| p.user_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    let users: Vec<User> = decode_all(
        backend
            .select(&Query::from(Table::Users).filter(Filter::any_of("id", ids)))
            .await?,
    )?;
    Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
}

/// Like counts for many posts in one call. Posts nobody liked are absent.
pub async fn like_counts(backend: &dyn Backend, post_ids: &[i64]) -> BackendResult<HashMap<i64, u64>> {
    let mut args = Row::new();
    args.insert("post_ids".into(), json!(post_ids));
    let counts = match backend.rpc("like_counts", args).await? {
        Value::Object(map) => map,
        _ => return Ok(HashMap::new()),
    };
    Ok(counts
        .into_iter()
        .filter_map(|(id, n)| Some((id.parse().ok()?, n.as_u64()?)))
        .collect())
}

/// Attaches authors, tags and like counts with one round-trip each,
/// whatever the number of posts.
async fn enrich(backend: &dyn Backend, posts: Vec<Post>, now: DateTime<Utc>) -> AppResult<Vec<PostView>> {
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

    let (authors, mut tags, likes) = futures::try_join!(
        authors(backend, &posts),
        tags::names_for_posts(backend, &ids),
        like_counts(backend, &ids),
    )?;

    Ok(posts
        .into_iter()
        .map(|post| PostView {
            username: authors.get(&post.user_id).cloned().unwrap_or_default(),
            tags: tags.remove(&post.id).unwrap_or_default(),
            like_count: likes.get(&post.id).copied().unwrap_or(0),
            time_label: time_label(post.created_at, now),
            id: post.id,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            category: post.category,
            lede: post.lede,
            thumbnail_url: post.thumbnail_url,
            created_at: post.created_at,
        })
        .collect())
}
