use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub image_url: Option<String>,
    pub bio: Option<String>,
    pub filepath: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub lede: Option<String>,
    pub thumbnail_url: Option<String>,
    pub filepath: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a post; the id is assigned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub lede: Option<String>,
    pub thumbnail_url: Option<String>,
    pub filepath: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostTag {
    pub post_id: i64,
    pub tag_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Like {
    pub user_id: String,
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Follow {
    pub follower_id: String,
    pub following_id: String,
}
