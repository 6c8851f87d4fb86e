//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use study_assistant_core::{domain::NewUser, ports::PortError};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    middleware::{session_cookie, SESSION_COOKIE},
    state::AppState,
};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("email pattern compiles"));

const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Registration form. Every field is required; missing ones are reported together.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub nickname: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub email: String,
    pub nickname: String,
}

//=========================================================================================
// Validation
//=========================================================================================

/// Trims `email` and checks its shape.
pub fn clean_email(email: &str) -> Option<String> {
    let email = email.trim();
    EMAIL_PATTERN.is_match(email).then(|| email.to_string())
}

/// Applies the registration rules in order, returning the first failure.
/// `password_hash` in the result is still the plaintext password.
fn validate_registration(req: RegisterRequest, today: NaiveDate) -> Result<NewUser, String> {
    let date_of_birth = match req.date_of_birth {
        Some(dob)
            if !req.email.trim().is_empty()
                && !req.password.is_empty()
                && !req.confirm_password.is_empty()
                && !req.nickname.trim().is_empty() =>
        {
            dob
        }
        _ => return Err("All fields are required.".to_string()),
    };

    let email = clean_email(&req.email).ok_or("Please enter a valid email address.")?;

    if req.password.chars().count() < 6 {
        return Err("Password must be at least 6 characters long.".to_string());
    }
    if req.password != req.confirm_password {
        return Err("Passwords do not match.".to_string());
    }
    if date_of_birth > today {
        return Err("Date of birth cannot be in the future.".to_string());
    }

    Ok(NewUser {
        email,
        password_hash: req.password,
        nickname: req.nickname.trim().to_string(),
        date_of_birth,
    })
}

fn session_cookie_header(auth_session_id: &str, max_age: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        max_age.num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful. Please log in.", body = AuthResponse),
        (status = 400, description = "Invalid registration details"),
        (status = 409, description = "This email is already registered."),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Validate the form
    let mut new_user = validate_registration(req, Utc::now().date_naive())
        .map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    new_user.password_hash = Argon2::default()
        .hash_password(new_user.password_hash.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 3. Create user in database
    let user = state.db.create_user(new_user).await.map_err(|e| match e {
        PortError::AlreadyExists(_) => (
            StatusCode::CONFLICT,
            "This email is already registered.".to_string(),
        ),
        e => {
            error!("Failed to create user: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
        }
    })?;
    info!("Registered new user {}", user.email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            email: user.email,
            nickname: user.nickname,
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());
    let email = clean_email(&req.email).ok_or_else(invalid)?;

    // 1. Get credentials by email
    let creds = state.db.get_credentials(&email).await.map_err(|e| match e {
        PortError::NotFound(_) => invalid(),
        e => {
            error!("Failed to get credentials: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
        }
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    // 3. Create the auth session
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .db
        .create_auth_session(&auth_session_id, &creds.email, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    let nickname = match state.db.find_user(&creds.email).await {
        Ok(Some(profile)) => profile.nickname,
        _ => String::new(),
    };
    info!("User {} logged in", creds.email);

    let cookie = session_cookie_header(&auth_session_id, Duration::days(SESSION_DAYS));
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            email: creds.email,
            nickname,
        }),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = session_cookie_header("", Duration::zero());
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}
