use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest,
            RefreshResponse, RegisterRequest, UpdateProfileRequest, UserResponse,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, validate_password, verify_password},
        repo::User,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route(
            "/auth/profile",
            get(get_profile).put(update_profile).delete(deactivate),
        )
        .route("/auth/change-password", put(change_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Merge the provided fields into the stored user. Absent fields stay
/// untouched; an explicit empty string clears the stored value.
fn apply_profile_update(user: &mut User, req: UpdateProfileRequest) {
    if let Some(v) = req.first_name {
        user.first_name = v;
    }
    if let Some(v) = req.last_name {
        user.last_name = v;
    }
    if let Some(v) = req.avatar {
        user.avatar = v;
    }
    if let Some(v) = req.bio {
        user.bio = v;
    }
    if let Some(v) = req.phone {
        user.phone = v;
    }
    if let Some(v) = req.location {
        user.location = v;
    }
    if let Some(v) = req.website {
        user.website = v;
    }
    if let Some(v) = req.linkedin {
        user.linkedin = v;
    }
    if let Some(v) = req.github {
        user.github = v;
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    validate_password(&payload.password)?;

    if User::email_exists(&state.db, &payload.email).await? {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::EmailTaken);
    }

    let hash = hash_password(&payload.password)?;
    let user = match User::create(
        &state.db,
        &payload.email,
        &hash,
        payload.first_name.trim(),
        payload.last_name.trim(),
    )
    .await
    {
        Ok(u) => u,
        // The exists-check races with concurrent registrations; the unique
        // index on email is the authority.
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
            warn!(email = %payload.email, "email uniqueness race lost");
            return Err(ApiError::EmailTaken);
        }
        Err(e) => return Err(e.into()),
    };

    let keys = JwtKeys::from_ref(&state);
    let pair = keys.sign_pair(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password must be indistinguishable.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };
    verify_password(&payload.password, &user.password_hash).map_err(|e| {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        e
    })?;

    // Best effort: a failed timestamp update must not fail the login.
    if let Err(e) = User::touch_last_login(&state.db, user.id).await {
        warn!(error = %e, user_id = %user.id, "failed to update last login");
    }

    let keys = JwtKeys::from_ref(&state);
    let pair = keys.sign_pair(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.refresh_access(&payload.refresh_token)?;
    Ok(Json(RefreshResponse { access_token }))
}

/// No server-side token state exists, so logout cannot invalidate anything;
/// the client discards its tokens and they lapse at their natural expiry.
#[instrument]
pub async fn logout(AuthUser(user_id): AuthUser) -> Result<Json<MessageResponse>, ApiError> {
    info!(user_id = %user_id, "user logged out");
    Ok(Json(MessageResponse {
        message: "logged out successfully",
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    apply_profile_update(&mut user, payload);
    let user = User::update_profile(&state.db, &user).await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    verify_password(&payload.current_password, &user.password_hash).map_err(|e| {
        warn!(user_id = %user.id, "change password with wrong current password");
        e
    })?;

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse {
        message: "password changed successfully",
    }))
}

#[instrument(skip(state))]
pub async fn deactivate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    User::deactivate(&state.db, user_id).await?;
    info!(user_id = %user_id, "account deactivated");
    Ok(Json(MessageResponse {
        message: "account deactivated",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }

    fn sample_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            avatar: "http://img".into(),
            bio: "engineer".into(),
            phone: "123".into(),
            location: "London".into(),
            website: "https://ada.dev".into(),
            linkedin: "in/ada".into(),
            github: "gh/ada".into(),
            is_verified: false,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn profile_patch_touches_only_provided_fields() {
        let mut user = sample_user();
        apply_profile_update(
            &mut user,
            UpdateProfileRequest {
                bio: Some("new bio".into()),
                ..Default::default()
            },
        );
        assert_eq!(user.bio, "new bio");
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.website, "https://ada.dev");
    }

    #[test]
    fn profile_patch_empty_string_clears_value() {
        let mut user = sample_user();
        apply_profile_update(
            &mut user,
            UpdateProfileRequest {
                phone: Some(String::new()),
                ..Default::default()
            },
        );
        assert_eq!(user.phone, "");
        assert_eq!(user.location, "London");
    }
}
