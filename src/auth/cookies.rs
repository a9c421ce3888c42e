//! Session cookies: set, refresh and clear the HttpOnly auth cookie pair.
//!
//! `Max-Age` is always taken from the same TTL the token was issued with.

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::HttpRequest;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "auth_token";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: i64,
    pub refresh_max_age: i64,
}

impl CookiePolicy {
    fn build(&self, name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build(name, value)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(time::Duration::seconds(max_age_secs))
            .finish()
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, token.to_string(), self.access_max_age)
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(REFRESH_COOKIE, token.to_string(), self.refresh_max_age)
    }

    pub fn clear_access_cookie(&self) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, String::new(), 0)
    }

    pub fn clear_refresh_cookie(&self) -> Cookie<'static> {
        self.build(REFRESH_COOKIE, String::new(), 0)
    }
}

/// Reads a non-empty cookie value from the request.
pub fn read_cookie(req: &HttpRequest, name: &str) -> Option<String> {
    req.cookie(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy {
            secure,
            access_max_age: 3600,
            refresh_max_age: 604_800,
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = policy(false).access_cookie("abc");
        assert_eq!(cookie.name(), "auth_token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
        assert_ne!(cookie.secure(), Some(true));

        let header = cookie.to_string();
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Max-Age=3600"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn test_refresh_cookie_max_age() {
        let cookie = policy(true).refresh_cookie("xyz");
        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604_800)));
        assert!(cookie.to_string().contains("Secure"));
    }

    #[test]
    fn test_clear_cookies_expire_immediately() {
        let policy = policy(false);
        for cookie in [policy.clear_access_cookie(), policy.clear_refresh_cookie()] {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
            assert!(cookie.to_string().contains("Max-Age=0"));
        }
    }
}
