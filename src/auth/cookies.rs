use axum::http::{header, HeaderMap};

pub const ACCESS_COOKIE: &str = "session_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

pub const ACCESS_MAX_AGE_SECS: i64 = 60 * 60;
pub const REFRESH_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

// Tokens never reach page scripts and only travel over TLS.
fn cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        name, value, max_age_secs
    )
}

pub fn access_cookie(token: &str) -> String {
    cookie(ACCESS_COOKIE, token, ACCESS_MAX_AGE_SECS)
}

pub fn refresh_cookie(token: &str) -> String {
    cookie(REFRESH_COOKIE, token, REFRESH_MAX_AGE_SECS)
}

/// Both cookies for a freshly issued token pair.
pub fn session_cookies(access_token: &str, refresh_token: &str) -> [String; 2] {
    [access_cookie(access_token), refresh_cookie(refresh_token)]
}

pub fn clear_session_cookies() -> [String; 2] {
    [cookie(ACCESS_COOKIE, "", 0), cookie(REFRESH_COOKIE, "", 0)]
}

pub fn get_cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn access_cookie_has_fixed_attributes() {
        let c = access_cookie("abc");
        assert!(c.starts_with("session_token=abc;"));
        assert!(c.contains("HttpOnly"));
        assert!(c.contains("Secure"));
        assert!(c.ends_with("Max-Age=3600"));
    }

    #[test]
    fn refresh_cookie_lasts_thirty_days() {
        assert!(refresh_cookie("r").ends_with("Max-Age=2592000"));
    }

    #[test]
    fn clearing_expires_both() {
        let [a, r] = clear_session_cookies();
        assert!(a.starts_with("session_token=;") && a.ends_with("Max-Age=0"));
        assert!(r.starts_with("refresh_token=;") && r.ends_with("Max-Age=0"));
    }

    #[test]
    fn parses_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_token=tok; refresh_token=ref"),
        );
        assert_eq!(get_cookie_value(&headers, ACCESS_COOKIE), Some("tok"));
        assert_eq!(get_cookie_value(&headers, REFRESH_COOKIE), Some("ref"));
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_token="));
        assert_eq!(get_cookie_value(&headers, ACCESS_COOKIE), None);
    }
}
