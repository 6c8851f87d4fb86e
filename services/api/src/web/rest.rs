//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the profile REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{self, AuthResponse, LoginRequest, RegisterRequest},
    middleware::CurrentUser,
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_assistant_core::{domain::UserProfile, ports::PortError};
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        get_profile_handler,
        update_profile_handler,
    ),
    components(
        schemas(RegisterRequest, LoginRequest, AuthResponse, ProfileResponse, UpdateProfileRequest)
    ),
    tags(
        (name = "Study Assistant API", description = "Accounts and learning profiles for the study chat. Chat itself runs over the /ws WebSocket.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A user's profile as shown on the profile page. Never includes the password.
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    email: String,
    nickname: String,
    date_of_birth: Option<NaiveDate>,
    recent_topic: Option<String>,
    topics_learned: Vec<String>,
    learning_style: Option<String>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            email: profile.email,
            nickname: profile.nickname,
            date_of_birth: profile.date_of_birth,
            recent_topic: profile.recent_topic,
            topics_learned: profile.topics_learned,
            learning_style: profile.learning_style,
        }
    }
}

/// Editable registration details.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub nickname: String,
    pub date_of_birth: NaiveDate,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get the signed-in user's profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The stored profile", body = ProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.db.find_user(&user.email).await {
        Ok(Some(profile)) => Ok(Json(ProfileResponse::from(profile))),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Profile not found".to_string())),
        Err(e) => {
            error!("Failed to load profile for {}: {:?}", user.email, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load profile".to_string(),
            ))
        }
    }
}

/// Edit the signed-in user's nickname and date of birth.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid details"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let nickname = req.nickname.trim();
    if nickname.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name cannot be empty.".to_string()));
    }
    if req.date_of_birth > Utc::now().date_naive() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Date of birth cannot be in the future.".to_string(),
        ));
    }

    app_state
        .db
        .update_details(&user.email, nickname, req.date_of_birth)
        .await
        .map(|profile| Json(ProfileResponse::from(profile)))
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Profile not found".to_string()),
            e => {
                error!("Failed to update profile for {}: {:?}", user.email, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update profile".to_string(),
                )
            }
        })
}
