pub mod auth;
pub mod form;
pub mod home;
pub mod likes;
pub mod posts;
pub mod profile;
pub mod search;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(home::router())
        .merge(auth::router())
        .merge(posts::router())
        .merge(profile::router())
        .merge(likes::router())
        .merge(search::router())
}
