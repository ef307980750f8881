//! URL builders for redirects and links

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub fn index() -> String {
    "/".to_string()
}

pub fn post_detail(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub fn profile(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub fn login_with_next(next: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(next))
}

/// Accept a `next` target only when it stays on this site
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.chars().any(char::is_control);
    local.then(|| next.to_string())
}

/// 302 Found redirect
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_url_is_encoded() {
        assert_eq!(profile("alice"), "/profile/alice/");
        assert_eq!(profile("a+b@c"), "/profile/a%2Bb%40c/");
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/posts/1/")), Some("/posts/1/".to_string()));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_found() {
        let response = found("/posts/3/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/posts/3/");
    }
}
