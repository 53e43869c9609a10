use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::content::search::{self, SearchHit};
use crate::content::{fetch_posts, FeedMode, PostView};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/query", get(typeahead))
        .route("/search", get(results))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResults {
    pub term: String,
    pub posts: Vec<PostView>,
}

/// GET /query?q=
///
/// Suggestions while typing.
async fn typeahead(user: MaybeUser, Query(params): Query<SearchParams>) -> AppResult<Json<Vec<SearchHit>>> {
    let hits = search::typeahead(user.backend.as_ref(), &params.q, search::DEFAULT_LIMIT).await?;
    Ok(Json(hits))
}

/// GET /search?q=
///
/// Posts whose title contains the term.
async fn results(user: MaybeUser, Query(params): Query<SearchParams>) -> AppResult<Json<SearchResults>> {
    let term = params.q.trim().to_string();
    let posts = if term.is_empty() {
        Vec::new()
    } else {
        fetch_posts(
            user.backend.as_ref(),
            &FeedMode::Search(term.clone()),
            Utc::now(),
        )
        .await?
    };
    Ok(Json(SearchResults { term, posts }))
}
