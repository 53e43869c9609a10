//! Likes and follows. Both are toggles over a unique pair; losing a race
//! to a concurrent toggle is treated as the toggle having happened.

use serde::Serialize;
use serde_json::{json, Value};

use crate::backend::{Backend, BackendError, Filter, Query, Row, Table};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FollowOutcome {
    pub following: bool,
    pub followers: u64,
}

fn pair(a: (&str, Value), b: (&str, Value)) -> Row {
    let mut row = Row::new();
    row.insert(a.0.into(), a.1);
    row.insert(b.0.into(), b.1);
    row
}

/// Flips the pair between present and absent. Returns whether it is
/// present afterwards.
async fn toggle(backend: &dyn Backend, table: Table, row: Row, filters: [Filter; 2]) -> AppResult<bool> {
    let mut exists = Query::from(table);
    for filter in &filters {
        exists = exists.filter(filter.clone());
    }

    if backend.count(&exists).await? > 0 {
        // Zero rows deleted means someone else already removed it
        backend.delete(table, &filters).await?;
        Ok(false)
    } else {
        match backend.insert(table, row).await {
            Ok(_) | Err(BackendError::Conflict(_)) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn toggle_like(backend: &dyn Backend, user_id: &str, post_id: i64) -> AppResult<LikeOutcome> {
    let liked = toggle(
        backend,
        Table::Likes,
        pair(("user_id", json!(user_id)), ("post_id", json!(post_id))),
        [Filter::eq("user_id", user_id), Filter::eq("post_id", post_id)],
    )
    .await
    .map_err(|e| match e {
        AppError::Backend(BackendError::ForeignKey(_)) => AppError::not_found("post"),
        other => other,
    })?;

    let count = post_like_count(backend, post_id).await?;
    tracing::debug!(user_id, post_id, liked, count, "toggled like");
    Ok(LikeOutcome { liked, count })
}

pub async fn toggle_follow(
    backend: &dyn Backend,
    follower_id: &str,
    following_id: &str,
) -> AppResult<FollowOutcome> {
    if follower_id == following_id {
        return Err(AppError::validation("following_id", "cannot follow yourself"));
    }

    let following = toggle(
        backend,
        Table::Follows,
        pair(
            ("follower_id", json!(follower_id)),
            ("following_id", json!(following_id)),
        ),
        [
            Filter::eq("follower_id", follower_id),
            Filter::eq("following_id", following_id),
        ],
    )
    .await
    .map_err(|e| match e {
        AppError::Backend(BackendError::ForeignKey(_)) => AppError::not_found("user"),
        other => other,
    })?;

    let followers = follower_count(backend, following_id).await?;
    tracing::debug!(follower_id, following_id, following, "toggled follow");
    Ok(FollowOutcome {
        following,
        followers,
    })
}

pub async fn is_liked(backend: &dyn Backend, user_id: &str, post_id: i64) -> AppResult<bool> {
    let n = backend
        .count(
            &Query::from(Table::Likes)
                .filter(Filter::eq("user_id", user_id))
                .filter(Filter::eq("post_id", post_id)),
        )
        .await?;
    Ok(n > 0)
}

pub async fn is_following(backend: &dyn Backend, follower_id: &str, following_id: &str) -> AppResult<bool> {
    let n = backend
        .count(
            &Query::from(Table::Follows)
                .filter(Filter::eq("follower_id", follower_id))
                .filter(Filter::eq("following_id", following_id)),
        )
        .await?;
    Ok(n > 0)
}

pub async fn post_like_count(backend: &dyn Backend, post_id: i64) -> AppResult<u64> {
    Ok(backend
        .count(&Query::from(Table::Likes).filter(Filter::eq("post_id", post_id)))
        .await?)
}

pub async fn follower_count(backend: &dyn Backend, user_id: &str) -> AppResult<u64> {
    Ok(backend
        .count(&Query::from(Table::Follows).filter(Filter::eq("following_id", user_id)))
        .await?)
}

pub async fn following_count(backend: &dyn Backend, user_id: &str) -> AppResult<u64> {
    Ok(backend
        .count(&Query::from(Table::Follows).filter(Filter::eq("follower_id", user_id)))
        .await?)
}

/// Likes received across all of a user's posts, aggregated server-side.
pub async fn total_likes(backend: &dyn Backend, user_id: &str) -> AppResult<u64> {
    let mut args = Row::new();
    args.insert("user_id".into(), json!(user_id));
    let total = backend.rpc("profile_total_likes", args).await?;
    total
        .as_u64()
        .ok_or_else(|| AppError::Internal(format!("unexpected total likes value {total}")))
}
