use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::Business;
use crate::db::repository::{BusinessRepository, CreateBusiness};
use crate::error::{AppError, AppResult};
use crate::services::sms;
use crate::AppState;

const AUTH_COOKIE: &str = "klario_token";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/me", get(me).put(update_me))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub sms_from_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub sms_from_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub business: Business,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Business id
    sub: i64,
    iat: usize,
    exp: usize,
}

// ============================================================================
// Handlers
// ============================================================================

async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    if let Some(label) = &body.sms_from_name {
        sms::validate_sender_label(label)?;
    }

    if BusinessRepository::find_by_email(&state.db, &body.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Business with this email already exists".to_string(),
        ));
    }

    let hashed = bcrypt::hash(&body.password, 12)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {e}")))?;

    let business = BusinessRepository::create(
        &state.db,
        CreateBusiness {
            name: body.name,
            email: body.email,
            phone: body.phone,
            password: hashed,
            sms_from_name: body.sms_from_name,
        },
    )
    .await?;

    tracing::info!("Business {} signed up", business.id);

    let token = create_token(&state, business.id)?;
    let jar = jar.add(auth_cookie(token.clone()));
    Ok((jar, Json(AuthResponse { business, token })))
}

async fn signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<SigninRequest>,
) -> AppResult<impl IntoResponse> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    // Same generic rejection for unknown email and wrong password.
    let business = BusinessRepository::find_by_email(&state.db, &body.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let valid = bcrypt::verify(&body.password, &business.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password verification failed: {e}")))?;
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let token = create_token(&state, business.id)?;
    let jar = jar.add(auth_cookie(token.clone()));
    Ok((jar, Json(AuthResponse { business, token })))
}

async fn signout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::from(AUTH_COOKIE));
    (jar, Json(json!({ "message": "Signed out successfully" })))
}

async fn me(AuthBusiness(business): AuthBusiness) -> Json<serde_json::Value> {
    Json(json!({ "business": business }))
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if let Some(label) = &body.sms_from_name {
        sms::validate_sender_label(label)?;
    }

    let updated = BusinessRepository::update_profile(
        &state.db,
        business.id,
        body.name.as_deref(),
        body.phone.as_deref(),
        body.sms_from_name.as_deref(),
    )
    .await?;

    Ok(Json(json!({ "business": updated })))
}

// ============================================================================
// Token helpers
// ============================================================================

fn create_token(state: &AppState, business_id: i64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: business_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(state.config.jwt.expiration_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )?;
    Ok(token)
}

fn auth_cookie(token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
}

// ============================================================================
// Auth Middleware / Extractor
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Extractor for the authenticated tenant. Accepts a bearer token or the
/// auth cookie; every tenant-scoped handler takes this before touching data.
pub struct AuthBusiness(pub Business);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthBusiness {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                let lower = v.to_ascii_lowercase();
                lower
                    .starts_with("bearer ")
                    .then(|| v[7..].trim().to_string())
            })
            .filter(|t| !t.is_empty());

        let token = match bearer {
            Some(token) => token,
            None => CookieJar::from_headers(&parts.headers)
                .get(AUTH_COOKIE)
                .map(|c| c.value().to_string())
                .ok_or_else(|| {
                    tracing::debug!("No bearer token or auth cookie on request");
                    AppError::Unauthorized
                })?,
        };

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;

        let business = BusinessRepository::find_by_id(&state.db, decoded.claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthBusiness(business))
    }
}
