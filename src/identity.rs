//! Client for the external identity provider that owns real accounts
//! (sign-up, e-mail verification, password reset).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::IdentityConfig;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("link is invalid or has expired")]
    ExpiredLink,
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub provider_id: String,
    pub email_confirmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub email: String,
    pub email_confirmed: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError>;
    async fn session(&self, access_token: &str) -> Result<SessionInfo, IdentityError>;
    async fn request_password_reset(&self, email: &str) -> Result<(), IdentityError>;
    /// `access_token` comes from the magic link; an expired one yields
    /// [`IdentityError::ExpiredLink`].
    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), IdentityError>;
    async fn resend_verification(&self, email: &str) -> Result<(), IdentityError>;
}

pub struct HttpIdentityProvider {
    client: reqwest::Client,
    config: IdentityConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: Option<&str>) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.config.api_key)
            .header("User-Agent", "iSponsor/1.0")
            .bearer_auth(bearer.unwrap_or(&self.config.api_key))
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, IdentityError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<Value>().await.unwrap_or(Value::Null));
    }
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let message = body
        .get("msg")
        .or_else(|| body.get("error_description"))
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str())
        .unwrap_or("request failed")
        .to_string();
    Err(IdentityError::Rejected { status: status.as_u16(), message })
}

fn email_confirmed(user: &Value) -> bool {
    user.get("email_confirmed_at").map(|v| !v.is_null()).unwrap_or(false)
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError> {
        let resp = self
            .request(reqwest::Method::POST, "signup", None)
            .query(&[("redirect_to", self.config.verify_redirect_url.as_str())])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body = read_json(resp).await?;
        // Depending on project settings the user is either the body or nested.
        let user = body.get("user").filter(|u| !u.is_null()).unwrap_or(&body);
        let provider_id = user
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IdentityError::Rejected { status: 200, message: "missing user id".to_string() })?
            .to_string();
        Ok(SignUpOutcome {
            provider_id,
            email_confirmed: email_confirmed(user),
        })
    }

    async fn session(&self, access_token: &str) -> Result<SessionInfo, IdentityError> {
        let resp = self.request(reqwest::Method::GET, "user", Some(access_token)).send().await?;
        let user = read_json(resp).await?;
        Ok(SessionInfo {
            email: user.get("email").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            email_confirmed: email_confirmed(&user),
        })
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let resp = self
            .request(reqwest::Method::POST, "recover", None)
            .query(&[("redirect_to", self.config.reset_redirect_url.as_str())])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        read_json(resp).await.map(|_| ())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), IdentityError> {
        let resp = self
            .request(reqwest::Method::PUT, "user", Some(access_token))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(IdentityError::ExpiredLink);
        }
        read_json(resp).await.map(|_| ())
    }

    async fn resend_verification(&self, email: &str) -> Result<(), IdentityError> {
        let resp = self
            .request(reqwest::Method::POST, "resend", None)
            .json(&json!({ "type": "signup", "email": email }))
            .send()
            .await?;
        read_json(resp).await.map(|_| ())
    }
}
