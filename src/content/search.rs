//! Typeahead across post titles, usernames and tag names.

use serde::Serialize;

use crate::backend::{decode_all, Backend, Direction, Filter, Query, Table};
use crate::db::models::{Post, Tag, User};
use crate::error::AppResult;

pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchHit {
    Post { id: i64, title: String },
    User { username: String },
    Tag { name: String },
}

/// Matches `term` against each kind, at most `limit` of each, merged as
/// posts (newest first), then users and tags (alphabetical).
pub async fn typeahead(backend: &dyn Backend, term: &str, limit: usize) -> AppResult<Vec<SearchHit>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }

    let posts = Query::from(Table::Posts)
        .filter(Filter::contains("title", term))
        .order_by("id", Direction::Desc)
        .limit(limit);
    let users = Query::from(Table::Users)
        .filter(Filter::contains("username", term))
        .order_by("username", Direction::Asc)
        .limit(limit);
    let tags = Query::from(Table::Tags)
        .filter(Filter::contains("name", term))
        .order_by("name", Direction::Asc)
        .limit(limit);

    let (posts, users, tags) = futures::try_join!(
        backend.select(&posts),
        backend.select(&users),
        backend.select(&tags),
    )?;

    let mut hits = Vec::new();
    hits.extend(
        decode_all::<Post>(posts)?
            .into_iter()
            .map(|p| SearchHit::Post { id: p.id, title: p.title }),
    );
    hits.extend(
        decode_all::<User>(users)?
            .into_iter()
            .map(|u| SearchHit::User { username: u.username }),
    );
    hits.extend(
        decode_all::<Tag>(tags)?
            .into_iter()
            .map(|t| SearchHit::Tag { name: t.name }),
    );
    Ok(hits)
}
