use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar, SameSite},
    WithRejection,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use pinboard_types::{LoginRequest, LoginResponse, User, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::UserRow,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

/// Name of the http-only cookie carrying the access token.
pub const TOKEN_COOKIE: &str = "access_token";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(user_id: UserId, username: &str, secret: &str, ttl_days: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::days(ttl_days))
        .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    if body.username.is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash FROM users WHERE username = ?",
    )
    .bind(&body.username)
    .fetch_optional(&state.db.pool)
    .await?;

    let user = match user {
        Some(user) if verify_password(&body.password, &user.password_hash)? => user,
        _ => {
            tracing::info!(username = %body.username, "login rejected");
            return Err(AppError::Unauthorized);
        }
    };

    let token = create_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.token_ttl_days,
    )?;

    tracing::info!(user_id = user.id, "login succeeded");

    let cookie = Cookie::build((TOKEN_COOKIE, token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            access_token: token,
            user: User {
                id: user.id,
                username: user.username,
            },
        }),
    ))
}

// Always emits the expired cookie, even if the request carried none
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let mut cookie = Cookie::from(TOKEN_COOKIE);
    cookie.set_path("/");
    cookie.make_removal();
    (jar.add(cookie), StatusCode::NO_CONTENT)
}

pub async fn me(user: AuthUser) -> Json<User> {
    Json(User {
        id: user.id,
        username: user.username,
    })
}
