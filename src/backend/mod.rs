//! Capability interface to the identity, data and object-storage service.
//!
//! Application code never talks to a database or bucket directly. It holds
//! an `Arc<dyn Backend>` minted by a [`Connector`] for the current request,
//! bound to that request's bearer token (or to no token at all). The only
//! holder of a service handle is the asset sweep.

pub mod local;
pub mod objects;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use local::LocalConnector;

/// A row as returned by the data service: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("referenced row does not exist: {0}")]
    ForeignKey(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A verified identity as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// Token pair issued on sign-in, confirmation or refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
}

/// Result of sign-up: the identity exists but cannot sign in until confirmed.
#[derive(Debug, Clone)]
pub struct PendingIdentity {
    pub id: String,
    pub email: String,
    pub confirmation_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Posts,
    Tags,
    PostTags,
    Likes,
    Follows,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Posts => "posts",
            Table::Tags => "tags",
            Table::PostTags => "post_tags",
            Table::Likes => "likes",
            Table::Follows => "follows",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Users => &["id", "username", "image_url", "bio", "filepath", "created_at"],
            Table::Posts => &[
                "id",
                "user_id",
                "title",
                "content",
                "category",
                "lede",
                "thumbnail_url",
                "filepath",
                "created_at",
            ],
            Table::Tags => &["id", "name"],
            Table::PostTags => &["post_id", "tag_id"],
            Table::Likes => &["user_id", "post_id"],
            Table::Follows => &["follower_id", "following_id"],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact equality.
    Eq(&'static str, Value),
    /// Case-insensitive pattern match; `%` and `_` are wildcards.
    ILike(&'static str, String),
    /// Membership in a set of values. An empty set matches nothing.
    In(&'static str, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    /// Case-insensitive substring match on `term`, with wildcards in the
    /// term itself escaped.
    pub fn contains(column: &'static str, term: &str) -> Self {
        let mut escaped = String::with_capacity(term.len() + 2);
        escaped.push('%');
        for c in term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped.push('%');
        Filter::ILike(column, escaped)
    }

    pub fn any_of<I, V>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(column, values.into_iter().map(Into::into).collect())
    }

    pub fn column(&self) -> &'static str {
        match self {
            Filter::Eq(c, _) | Filter::ILike(c, _) | Filter::In(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: &'static str,
    pub direction: Direction,
}

/// A read against one table: conjunction of filters, ordering, limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order.push(Order { column, direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A stored object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub path: String,
    pub modified: DateTime<Utc>,
}

/// One page of an object listing.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// Identity, data and storage capabilities, scoped to one principal.
#[async_trait]
pub trait Backend: Send + Sync {
    // -- identity --

    async fn verify_access_token(&self, token: &str) -> BackendResult<Identity>;
    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession>;
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<PendingIdentity>;
    async fn confirm_sign_up(&self, confirmation_token: &str) -> BackendResult<AuthSession>;
    async fn sign_out(&self, access_token: &str) -> BackendResult<()>;

    // -- data --

    async fn select(&self, query: &Query) -> BackendResult<Vec<Row>>;
    async fn count(&self, query: &Query) -> BackendResult<u64>;
    /// Inserts one row and returns it as stored (including generated ids).
    /// A unique-key violation is reported as [`BackendError::Conflict`].
    async fn insert(&self, table: Table, row: Row) -> BackendResult<Row>;
    async fn update(&self, table: Table, values: Row, filters: &[Filter]) -> BackendResult<u64>;
    async fn delete(&self, table: Table, filters: &[Filter]) -> BackendResult<u64>;
    /// Invokes a named server-side function.
    async fn rpc(&self, function: &str, args: Row) -> BackendResult<Value>;

    // -- storage --

    /// Stores an object and returns its public URL.
    async fn upload(&self, path: &str, bytes: Bytes) -> BackendResult<String>;
    async fn remove(&self, paths: &[String]) -> BackendResult<()>;
    /// Lists objects under a folder, sorted by path.
    async fn list(&self, folder: &str, page: Page) -> BackendResult<Vec<ObjectInfo>>;
}

/// Mints backend handles. Cheap to call once per request.
pub trait Connector: Send + Sync {
    fn anonymous(&self) -> Arc<dyn Backend>;
    fn for_token(&self, access_token: &str) -> Arc<dyn Backend>;
    /// Elevated handle that bypasses row policies. Never hand this to a
    /// request.
    fn service(&self) -> Arc<dyn Backend>;
}

/// Decodes a row into a typed model.
pub fn decode<T: DeserializeOwned>(row: Row) -> BackendResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> BackendResult<Vec<T>> {
    rows.into_iter().map(decode).collect()
}

/// Encodes a serializable value as a row.
pub fn encode<T: Serialize>(value: &T) -> BackendResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidQuery(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contains_escapes_wildcards() {
        assert_eq!(
            Filter::contains("title", "50%_off"),
            Filter::ILike("title", "%50\\%\\_off%".to_string())
        );
    }

    #[test]
    fn query_builder_accumulates() {
        let q = Query::from(Table::Posts)
            .filter(Filter::eq("user_id", "u1"))
            .order_by("id", Direction::Desc)
            .limit(5);
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.order[0].direction, Direction::Desc);
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn columns_are_whitelisted_per_table() {
        assert!(Table::Posts.has_column("title"));
        assert!(!Table::Posts.has_column("username"));
        assert!(Table::Follows.has_column("following_id"));
    }

    #[test]
    fn encode_rejects_non_objects() {
        assert!(encode(&json!([1, 2])).is_err());
        assert!(encode(&json!({"a": 1})).is_ok());
    }
}
