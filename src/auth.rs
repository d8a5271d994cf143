use axum::{
    extract::{State, Json, FromRequestParts},
    response::IntoResponse,
    http::{StatusCode, request::Parts, HeaderValue, header},
};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::db::models::{AuditResult, NewAuditEvent, Role, User};
use crate::demo::DemoScenarioPatch;
use jsonwebtoken::{encode, decode, EncodingKey, DecodingKey, Header, Validation};
use chrono::{Utc, Duration};

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    // Any password is accepted in the demo, so only the e-mail is read.
    email: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserProfile,
    token: String,
}

#[derive(Serialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    email: String,
    name: String,
    role: Role,
}

pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Rejects the request with 403 unless the user holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), (StatusCode, String)> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err((StatusCode::FORBIDDEN, format!("{} accounts cannot do this", self.role)))
        }
    }

    /// Name recorded as the audit actor.
    pub fn actor(&self) -> String {
        self.role.to_string()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::warn!("Token error: {}", e);
            (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
        })?;

        Ok(AuthenticatedUser {
            id: token_data.claims.sub,
            email: token_data.claims.email,
            name: token_data.claims.name,
            role: token_data.claims.role,
        })
    }
}

/// Demo sign-in: the account must exist, the password is not checked. The
/// scenario can simulate a locked, suspended or unapproved account.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let mut store = state.store.lock();
    let scenario = store.scenario().clone();
    let email = payload.email.trim();

    let Some(user) = store
        .list::<User>()
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(email))
        .cloned()
    else {
        store.log_event(NewAuditEvent::new("system", "Login", "session", AuditResult::Error));
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    };

    let shelter_block = match user.role {
        Role::Shelter => store.shelter_block(&user.id),
        _ => None,
    };
    let refusal = if scenario.login_lockout {
        Some((StatusCode::LOCKED, "Too many attempts; account temporarily locked".to_string()))
    } else if scenario.account_suspended {
        Some((StatusCode::FORBIDDEN, "Account suspended".to_string()))
    } else {
        shelter_block.map(|status| (StatusCode::FORBIDDEN, format!("Shelter account is {}", status)))
    };
    if let Some((status, message)) = refusal {
        store.log_event(
            NewAuditEvent::new(user.role.to_string(), format!("Login refused: {}", message), "session", AuditResult::Error)
                .with_ref(user.id.clone()),
        );
        return (status, message).into_response();
    }

    store.update_scenario(DemoScenarioPatch {
        active_role: Some(user.role),
        ..Default::default()
    });
    store.log_event(
        NewAuditEvent::new(user.role.to_string(), "Login", "session", AuditResult::Ok).with_ref(user.id.clone()),
    );
    drop(store);

    let profile = UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    };
    match create_jwt(&profile, &state.config.jwt_secret) {
        Ok(token) => {
            let cookie = build_auth_cookie(&token, state.config.is_production());
            let mut response = Json(AuthResponse { user: profile, token }).into_response();
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
            response
        }
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to create token").into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = clear_auth_cookie(state.config.is_production());
    let mut response = (StatusCode::OK, "OK").into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

pub async fn me(user: AuthenticatedUser) -> impl IntoResponse {
    let profile = UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    };
    Json(profile)
}

pub fn create_jwt(user: &UserProfile, secret: &str) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        exp: expiration as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))?;
    Ok(token)
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
    {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some((k, v)) = cookie.split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn build_auth_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME,
        token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
