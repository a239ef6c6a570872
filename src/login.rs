#![cfg(not(tarpaulin_include))]

use crate::mailer::{Mailer, generate_otp, generate_reset_code};
use crate::models::Provider;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// A registered dashboard user.
///
/// Accounts are keyed by email. Google-provisioned accounts carry no local
/// password hash and can neither log in with a password nor reset one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// Argon2 hash; `None` for Google-provisioned accounts
    pub password_hash: Option<String>,

    pub provider: Provider,
    pub is_admin: bool,

    /// One time passcode issued at admin login, with its expiry
    pub otp_code: Option<String>,
    pub otp_expires: Option<SystemTime>,

    /// Password reset code, with its expiry
    pub reset_code: Option<String>,
    pub reset_code_expires: Option<SystemTime>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Login form payload. The password travels base64 encoded, exactly as the
/// login page submits it.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration form payload.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// OTP confirmation payload.
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub email: String,
    pub otp: String,
}

/// Reset-link request payload.
#[derive(Debug, Deserialize)]
pub struct SendResetRequest {
    pub email: String,
}

/// Password reset confirmation payload.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
    pub reset_code: String,
    pub password: String,
}

/// Row of the admin page's user table.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub email: String,
    pub permissions: &'static str,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

// Constants
const USERS_FILE: &str = "database/users.json";
const DATABASE_DIR: &str = "database";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds
const OTP_DURATION: u64 = 120;
const RESET_DURATION: u64 = 3600;

/// Initialize the database structure
///
/// Creates the database directory and users file if they don't exist.
/// This should be called before any other account operation.
pub fn init_database() -> std::io::Result<()> {
    if !std::path::Path::new(DATABASE_DIR).exists() {
        create_dir_all(DATABASE_DIR)?;
    }

    let users_path = std::path::Path::new(USERS_FILE);
    if !users_path.exists() {
        let mut file = File::create(users_path)?;
        file.write_all(b"{}")?;
    }

    Ok(())
}

/// Get all registered users
///
/// # Returns
/// * `Result<HashMap<String, User>, String>` - Map of emails to user
///   objects, or an error
pub fn get_users() -> Result<HashMap<String, User>, String> {
    let mut file = match File::open(USERS_FILE) {
        Ok(file) => file,
        Err(_) => return Err("Failed to open users file".to_string()),
    };

    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return Err("Failed to read users file".to_string());
    }

    match serde_json::from_str(&contents) {
        Ok(users) => Ok(users),
        Err(_) => Err("Failed to parse users data".to_string()),
    }
}

/// Save the users map to disk
pub fn save_users(users: &HashMap<String, User>) -> Result<(), String> {
    let json = match serde_json::to_string_pretty(users) {
        Ok(json) => json,
        Err(_) => return Err("Failed to serialize users data".to_string()),
    };

    let mut file = match File::create(USERS_FILE) {
        Ok(file) => file,
        Err(_) => return Err("Failed to create users file".to_string()),
    };

    if file.write_all(json.as_bytes()).is_err() {
        return Err("Failed to write users data".to_string());
    }

    Ok(())
}

/// Register a new local user account.
///
/// The password is hashed before storage. Emails listed in the
/// `ADMIN_EMAILS` environment variable (comma separated) are enrolled as
/// administrators.
///
/// # Errors
/// * Returns an error if any field is empty, the email is malformed, or
///   the email is already registered
pub fn register_user(
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<(), String> {
    if email.is_empty() || first_name.is_empty() || last_name.is_empty() || password.is_empty() {
        return Err("Name, email and password cannot be empty".to_string());
    }

    if !EMAIL_RE.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    let mut users = get_users()?;
    if users.contains_key(email) {
        return Err("User exists".to_string());
    }

    let password_hash = hash_password(password)?;

    let is_admin = std::env::var("ADMIN_EMAILS")
        .map(|list| list.split(',').any(|e| e.trim() == email))
        .unwrap_or(false);

    let user = User {
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        password_hash: Some(password_hash),
        provider: Provider::Local,
        is_admin,
        otp_code: None,
        otp_expires: None,
        reset_code: None,
        reset_code_expires: None,
    };

    users.insert(email.to_string(), user);
    save_users(&users)?;

    Ok(())
}

/// Verify user credentials
///
/// # Returns
/// * `Result<bool, String>` - True if credentials are valid, false if
///   invalid, or an error for non-local providers
pub fn verify_user(email: &str, password: &str) -> Result<bool, String> {
    let users = get_users()?;

    if let Some(user) = users.get(email) {
        if user.provider != Provider::Local {
            return Err("Account does not use a local password".to_string());
        }
        match &user.password_hash {
            Some(hash) => verify_password(password, hash),
            None => Ok(false),
        }
    } else {
        Ok(false)
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Decode the base64-encoded password field the auth forms submit.
fn decode_password(encoded: &str) -> Result<String, String> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| "Malformed password encoding".to_string())?;
    String::from_utf8(bytes).map_err(|_| "Malformed password encoding".to_string())
}

/// Create a new user session and return its id.
pub fn create_session(email: &str) -> String {
    create_session_for(email, Duration::from_secs(SESSION_DURATION))
}

/// Create a session with an explicit lifetime.
///
/// Expired sessions are pruned from the store on every insert so the map
/// stays bounded by the number of live sessions.
pub fn create_session_for(email: &str, lifetime: Duration) -> String {
    let session_id = Uuid::new_v4().to_string();
    let now = SystemTime::now();

    let session = Session {
        user_id: email.to_string(),
        expires_at: now + lifetime,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.retain(|_, s| s.expires_at > now);
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Validate a session, returning the email it belongs to if still live.
/// An expired session is removed from the store on lookup.
pub fn validate_session(session_id: &str) -> Option<String> {
    let mut sessions = SESSIONS.write().unwrap();

    match sessions.get(session_id) {
        Some(session) if session.expires_at > SystemTime::now() => {
            Some(session.user_id.clone())
        }
        Some(_) => {
            sessions.remove(session_id);
            None
        }
        None => None,
    }
}

/// Number of sessions currently held in the store.
pub fn session_count() -> usize {
    SESSIONS.read().unwrap().len()
}

/// Drop a session from the store.
pub fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

/// The user behind the request's session cookie, if any.
pub fn current_user(jar: &CookieJar) -> Option<User> {
    let cookie = jar.get("session")?;
    let email = validate_session(cookie.value())?;
    get_users().ok()?.remove(&email)
}

/// Total and administrator account counts for the admin page.
pub fn account_counts(users: &HashMap<String, User>) -> (usize, usize) {
    let admins = users.values().filter(|u| u.is_admin).count();
    (users.len(), admins)
}

/// User table rows for the admin page.
pub fn user_summaries() -> Result<Vec<UserSummary>, String> {
    let users = get_users()?;
    let mut summaries: Vec<UserSummary> = users
        .values()
        .map(|u| UserSummary {
            name: u.full_name(),
            email: u.email.clone(),
            permissions: if u.is_admin { "Admin" } else { "User" },
        })
        .collect();
    summaries.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(summaries)
}

// Web handler functions below

/// Handle user login requests
///
/// Verifies the email and password. Plain users get a session cookie and a
/// redirect to the dashboard. Administrators get `202 Accepted` plus a one
/// time passcode emailed to them; the session is only issued once `/otp`
/// confirms the code.
pub async fn handle_login(jar: CookieJar, Json(body): Json<LoginRequest>) -> Response {
    let password = match decode_password(&body.password) {
        Ok(password) => password,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"message": "Bad Request"})))
                .into_response();
        }
    };

    match verify_user(&body.email, &password) {
        Ok(true) => {
            let mut users = match get_users() {
                Ok(users) => users,
                Err(_) => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"message": "Authentication error"})),
                    )
                        .into_response();
                }
            };
            // Presence checked by verify_user.
            let user = match users.get_mut(&body.email) {
                Some(user) => user,
                None => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"message": "Failed Login"})),
                    )
                        .into_response();
                }
            };

            if user.is_admin {
                let otp = generate_otp();
                user.otp_code = Some(otp.clone());
                user.otp_expires = Some(SystemTime::now() + Duration::from_secs(OTP_DURATION));
                let email = user.email.clone();

                if save_users(&users).is_err() {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"message": "Authentication error"})),
                    )
                        .into_response();
                }

                match Mailer::from_env() {
                    Ok(mailer) => {
                        if mailer.send_otp(&email, &otp).is_err() {
                            return (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Json(json!({"message": "Failed to send OTP"})),
                            )
                                .into_response();
                        }
                    }
                    Err(_) => {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"message": "Failed to initialize mailer"})),
                        )
                            .into_response();
                    }
                }

                (
                    StatusCode::ACCEPTED,
                    Json(json!({"message": "Successful Admin Login"})),
                )
                    .into_response()
            } else {
                let session_id = create_session(&body.email);
                let cookie = Cookie::build(("session", session_id)).path("/").build();
                (jar.add(cookie), Redirect::to("/dashboard")).into_response()
            }
        }
        Ok(false) | Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Failed Login"})),
        )
            .into_response(),
    }
}

/// Handle OTP confirmation for administrator logins.
///
/// The code is single use and expires two minutes after issue.
pub async fn handle_otp(jar: CookieJar, Json(body): Json<OtpRequest>) -> Response {
    let mut users = match get_users() {
        Ok(users) => users,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Authentication error"})),
            )
                .into_response();
        }
    };

    let user = match users.get_mut(&body.email) {
        Some(user) => user,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Invalid OTP"})),
            )
                .into_response();
        }
    };

    let valid = match (&user.otp_code, user.otp_expires) {
        (Some(code), Some(expires)) => {
            SystemTime::now() <= expires && *code == body.otp
        }
        _ => false,
    };

    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid OTP"})),
        )
            .into_response();
    }

    user.otp_code = None;
    user.otp_expires = None;
    let email = user.email.clone();

    if save_users(&users).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Authentication error"})),
        )
            .into_response();
    }

    let session_id = create_session(&email);
    let cookie = Cookie::build(("session", session_id)).path("/").build();
    (jar.add(cookie), Redirect::to("/dashboard")).into_response()
}

/// Handle user registration
pub async fn handle_register(Json(body): Json<RegisterRequest>) -> Response {
    let password = match decode_password(&body.password) {
        Ok(password) => password,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"message": "Bad Request"})))
                .into_response();
        }
    };

    match register_user(&body.email, &body.first_name, &body.last_name, &password) {
        Ok(_) => (StatusCode::OK, Json(json!({"message": "Success"}))).into_response(),
        Err(e) if e == "User exists" => {
            (StatusCode::CONFLICT, Json(json!({"message": "User exists"}))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": e})),
        )
            .into_response(),
    }
}

/// Handle user logout
///
/// Drops the session and answers with a removal cookie (max-age 0) so the
/// browser discards it, then redirects to the login page.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get("session") {
        destroy_session(cookie.value());
    }
    let mut removal = Cookie::from("session");
    removal.set_path("/");

    (jar.remove(removal), Redirect::to("/login"))
}

/// Handle a request to email a password reset code.
pub async fn handle_send_reset(Json(body): Json<SendResetRequest>) -> Response {
    let mut users = match get_users() {
        Ok(users) => users,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Server error"})),
            )
                .into_response();
        }
    };

    let user = match users.get_mut(&body.email) {
        Some(user) => user,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Email not found"})),
            )
                .into_response();
        }
    };

    if user.provider != Provider::Local {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Cannot reset the password of a Google account"})),
        )
            .into_response();
    }

    let reset_code = generate_reset_code();
    user.reset_code = Some(reset_code.clone());
    user.reset_code_expires = Some(SystemTime::now() + Duration::from_secs(RESET_DURATION));
    let email = user.email.clone();

    if save_users(&users).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Failed to generate reset code"})),
        )
            .into_response();
    }

    match Mailer::from_env() {
        Ok(mailer) => {
            if mailer.send_password_reset(&email, &reset_code).is_err() {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"message": "Failed to send email"})),
                )
                    .into_response();
            }
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to initialize mailer"})),
            )
                .into_response();
        }
    }

    (StatusCode::OK, Json(json!({"message": "Email sent"}))).into_response()
}

/// Handle password reset confirmation
///
/// Verifies the emailed code, rejects expired codes and reuse of the
/// current password, then stores the new hash.
pub async fn handle_reset(Json(body): Json<ResetRequest>) -> Response {
    let password = match decode_password(&body.password) {
        Ok(password) => password,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"message": "Bad Request"})))
                .into_response();
        }
    };

    let mut users = match get_users() {
        Ok(users) => users,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Server error"})),
            )
                .into_response();
        }
    };

    let user = match users.get_mut(&body.email) {
        Some(user) => user,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Email not found"})),
            )
                .into_response();
        }
    };

    if user.provider != Provider::Local {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Cannot reset the password of a Google account"})),
        )
            .into_response();
    }

    let code_ok = match (&user.reset_code, user.reset_code_expires) {
        (Some(code), Some(expires)) => {
            SystemTime::now() <= expires && *code == body.reset_code
        }
        _ => false,
    };
    if !code_ok {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid or expired reset code"})),
        )
            .into_response();
    }

    if let Some(hash) = &user.password_hash {
        if verify_password(&password, hash).unwrap_or(false) {
            return (
                StatusCode::CONFLICT,
                Json(json!({"message": "Cannot reuse a previously used password"})),
            )
                .into_response();
        }
    }

    match hash_password(&password) {
        Ok(hash) => {
            user.password_hash = Some(hash);
            user.reset_code = None;
            user.reset_code_expires = None;

            if save_users(&users).is_err() {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"message": "Failed to save new password"})),
                )
                    .into_response();
            }

            (StatusCode::OK, Json(json!({"message": "Password reset successful"})))
                .into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Failed to hash password"})),
        )
            .into_response(),
    }
}

/// Authentication middleware
///
/// Lets authenticated requests through with the user's email attached as a
/// request extension; everything else is redirected to the login page.
pub async fn require_auth(
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get("session") {
        if let Some(email) = validate_session(session_cookie.value()) {
            request.extensions_mut().insert(email);
            return next.run(request).await;
        }
    }

    Redirect::to("/login").into_response()
}
