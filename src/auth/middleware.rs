use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::auth::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::session::{self, Resolution};
use crate::state::AppState;

/// Middleware that resolves the session cookies of every request.
///
/// The resolved [`session::RequestSession`] is stored in the request
/// extensions for the extractors. When the refresh token minted a new pair,
/// both cookies are re-issued on the response, unless the handler already
/// set session cookies of its own (login, logout).
pub async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let access = cookies::get_cookie_value(req.headers(), ACCESS_COOKIE).map(str::to_owned);
    let refresh = cookies::get_cookie_value(req.headers(), REFRESH_COOKIE).map(str::to_owned);

    let Resolution {
        session,
        set_cookies,
    } = session::resolve(state.connector.as_ref(), access.as_deref(), refresh.as_deref()).await;

    req.extensions_mut().insert(session);
    let mut response = next.run(req).await;

    if set_cookies.is_empty() || handler_set_session(&response) {
        return response;
    }
    for cookie in set_cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Refusing malformed session cookie: {}", e),
        }
    }
    response
}

fn handler_set_session(response: &Response) -> bool {
    let prefix = format!("{ACCESS_COOKIE}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}
