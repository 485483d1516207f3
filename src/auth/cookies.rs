use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::CookieConfig;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Attach both session cookies. `secure` is true only for a production
/// deployment behind HTTPS.
pub fn set_session_cookies(
    jar: CookieJar,
    cfg: &CookieConfig,
    access_token: &str,
    refresh_token: &str,
    secure: bool,
) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token.to_owned(),
        Duration::minutes(cfg.access_ttl_minutes),
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        refresh_token.to_owned(),
        Duration::days(cfg.refresh_ttl_days),
        secure,
    ))
}

/// Logout overwrites both cookies with a short-lived sentinel value.
pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        "logout".into(),
        Duration::seconds(10),
        false,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        "logout".into(),
        Duration::seconds(10),
        false,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CookieConfig {
        CookieConfig {
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }

    #[test]
    fn session_cookies_are_http_only_with_configured_lifetimes() {
        let jar = set_session_cookies(CookieJar::new(), &cfg(), "acc", "ref", false);
        let access = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
        let refresh = jar.get(REFRESH_TOKEN_COOKIE).unwrap();
        assert!(access.http_only().unwrap_or(false));
        assert!(refresh.http_only().unwrap_or(false));
        assert_eq!(access.max_age(), Some(Duration::minutes(15)));
        assert_eq!(refresh.max_age(), Some(Duration::days(7)));
        assert_eq!(access.value(), "acc");
        assert_eq!(refresh.value(), "ref");
    }

    #[test]
    fn secure_flag_follows_deployment() {
        let jar = set_session_cookies(CookieJar::new(), &cfg(), "a", "r", true);
        assert!(jar.get(ACCESS_TOKEN_COOKIE).unwrap().secure().unwrap_or(false));
        let jar = set_session_cookies(CookieJar::new(), &cfg(), "a", "r", false);
        assert!(!jar.get(ACCESS_TOKEN_COOKIE).unwrap().secure().unwrap_or(false));
    }

    #[test]
    fn clearing_replaces_tokens_with_a_short_lived_sentinel() {
        let jar = set_session_cookies(CookieJar::new(), &cfg(), "acc", "ref", false);
        let jar = clear_session_cookies(jar);
        let access = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
        assert_eq!(access.value(), "logout");
        assert_eq!(access.max_age(), Some(Duration::seconds(10)));
    }
}
