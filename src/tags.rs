//! Tag resolution: free-text names to tag ids, created on first use.
//!
//! Tag names are normalized before lookup: trimmed, inner whitespace
//! collapsed to one space, lowercased. `"Rust"`, `" rust "` and `"RUST"`
//! are the same tag.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use crate::backend::{
    decode, decode_all, Backend, BackendError, Direction, Filter, Query, Row, Table,
};
use crate::db::models::{PostTag, Tag};

pub const MAX_TAG_LEN: usize = 40;

pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Splits a comma-separated list, normalizing and dropping empty and
/// repeated names. First occurrence wins the position.
pub fn parse_tag_list(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',').map(normalize) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TagFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of linking a list of tags to a post. The post exists whatever
/// the outcome; failures are per tag.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TagReport {
    pub linked: Vec<Tag>,
    pub failures: Vec<TagFailure>,
}

impl TagReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn find_tag(backend: &dyn Backend, name: &str) -> Result<Option<Tag>, BackendError> {
    let rows = backend
        .select(&Query::from(Table::Tags).filter(Filter::eq("name", name)).limit(1))
        .await?;
    Ok(decode_all::<Tag>(rows)?.into_iter().next())
}

/// Looks up a tag by normalized name, creating it if absent. Losing a
/// creation race to another request re-reads the winner's row.
pub async fn resolve_tag(backend: &dyn Backend, name: &str) -> Result<Tag, BackendError> {
    if let Some(tag) = find_tag(backend, name).await? {
        return Ok(tag);
    }

    let mut row = Row::new();
    row.insert("name".into(), json!(name));
    match backend.insert(Table::Tags, row).await {
        Ok(row) => decode(row),
        Err(BackendError::Conflict(_)) => find_tag(backend, name)
            .await?
            .ok_or(BackendError::NotFound),
        Err(e) => Err(e),
    }
}

async fn link(backend: &dyn Backend, post_id: i64, tag: &Tag) -> Result<(), BackendError> {
    let mut row = Row::new();
    row.insert("post_id".into(), json!(post_id));
    row.insert("tag_id".into(), json!(tag.id));
    match backend.insert(Table::PostTags, row).await {
        Ok(_) | Err(BackendError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Resolves and links every name, carrying on past failures.
pub async fn link_tags(backend: &dyn Backend, post_id: i64, names: &[String]) -> TagReport {
    let mut report = TagReport::default();

    for name in names {
        if name.chars().count() > MAX_TAG_LEN {
            report.failures.push(TagFailure {
                name: name.clone(),
                reason: format!("longer than {MAX_TAG_LEN} characters"),
            });
            continue;
        }

        let result = match resolve_tag(backend, name).await {
            Ok(tag) => link(backend, post_id, &tag).await.map(|_| tag),
            Err(e) => Err(e),
        };
        match result {
            Ok(tag) => report.linked.push(tag),
            Err(e) => {
                tracing::warn!(post_id, tag = %name, error = %e, "failed to link tag");
                report.failures.push(TagFailure {
                    name: name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Tag names per post, in tag creation order.
pub async fn names_for_posts(
    backend: &dyn Backend,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>, BackendError> {
    let mut by_post: HashMap<i64, Vec<String>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(by_post);
    }

    let links: Vec<PostTag> = decode_all(
        backend
            .select(
                &Query::from(Table::PostTags)
                    .filter(Filter::any_of("post_id", post_ids.iter().copied()))
                    .order_by("tag_id", Direction::Asc),
            )
            .await?,
    )?;
    if links.is_empty() {
        return Ok(by_post);
    }

    let mut tag_ids: Vec<i64> = links.iter().map(|l| l.tag_id).collect();
    tag_ids.sort_unstable();
    tag_ids.dedup();
    let tags: HashMap<i64, String> = decode_all::<Tag>(
        backend
            .select(&Query::from(Table::Tags).filter(Filter::any_of("id", tag_ids)))
            .await?,
    )?
    .into_iter()
    .map(|t| (t.id, t.name))
    .collect();

    for link in links {
        if let Some(name) = tags.get(&link.tag_id) {
            by_post.entry(link.post_id).or_default().push(name.clone());
        }
    }
    Ok(by_post)
}
