#![cfg(feature = "web")]

use axum::http::HeaderMap;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use std::collections::HashMap;
use std::time::Duration;
use stemdash::login::{
    User, account_counts, create_session, create_session_for, handle_logout, session_count,
    validate_session,
};
use stemdash::models::Provider;

fn user(email: &str, is_admin: bool) -> User {
    User {
        email: email.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        password_hash: Some("hash".to_string()),
        provider: Provider::Local,
        is_admin,
        otp_code: None,
        otp_expires: None,
        reset_code: None,
        reset_code_expires: None,
    }
}

#[test]
fn account_counts_split_admins_from_users() {
    let mut users = HashMap::new();
    users.insert("a@example.com".to_string(), user("a@example.com", true));
    users.insert("b@example.com".to_string(), user("b@example.com", false));
    users.insert("c@example.com".to_string(), user("c@example.com", false));

    assert_eq!(account_counts(&users), (3, 1));

    users.insert("d@example.com".to_string(), user("d@example.com", true));
    assert_eq!(account_counts(&users), (4, 2));

    assert_eq!(account_counts(&HashMap::new()), (0, 0));
}

// The session store and the logout handler share global state, so every
// assertion runs sequentially inside one test.
#[tokio::test]
async fn session_lifecycle() {
    // Login: a live session validates to its user.
    let id = create_session("live@example.com");
    assert_eq!(validate_session(&id), Some("live@example.com".to_string()));

    // Logout answers with a removal cookie so the browser drops it.
    // Build the jar the way the extractor does, so the request cookie is an
    // "original" and `jar.remove` emits a removal Set-Cookie.
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, format!("session={}", id).parse().unwrap());
    let jar = CookieJar::from_headers(&headers);
    let response = handle_logout(jar).await.into_response();
    let removal = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .find(|c| c.starts_with("session="))
        .expect("logout must reset the session cookie");
    assert!(removal.contains("Max-Age=0"), "got: {}", removal);
    assert_eq!(validate_session(&id), None);

    // An expired session is rejected and dropped on lookup.
    let expired = create_session_for("stale@example.com", Duration::ZERO);
    assert_eq!(validate_session(&expired), None);

    // Expired entries are also pruned when a new session is inserted.
    let lingering = create_session_for("stale@example.com", Duration::ZERO);
    let before = session_count();
    let fresh = create_session("fresh@example.com");
    assert_eq!(session_count(), before, "expired session must be pruned");
    assert_eq!(validate_session(&lingering), None);
    assert_eq!(
        validate_session(&fresh),
        Some("fresh@example.com".to_string())
    );
}
