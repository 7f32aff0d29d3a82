use clap::ValueEnum;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::KvStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

// Older builds wrote camelCase keys. Still read, never written.
const LEGACY_ACCESS_TOKEN_KEY: &str = "accessToken";
const LEGACY_REFRESH_TOKEN_KEY: &str = "refreshToken";

const MIN_PASSWORD_LEN: usize = 6;
const EMAIL_PATTERN: &str = r"^\S+@\S+\.\S+$";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },
    #[error("auth request failed: {0}")]
    Network(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OAuthProvider {
    Google,
    Linkedin,
    Github,
}

impl OAuthProvider {
    fn path_segment(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Linkedin => "linkedin",
            OAuthProvider::Github => "github",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::Invalid("All fields are required!".to_string()));
        }
        let email_pattern = Regex::new(EMAIL_PATTERN).map_err(|e| AuthError::Invalid(e.to_string()))?;
        if !email_pattern.is_match(&self.email) {
            return Err(AuthError::Invalid("Enter a valid email address!".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Invalid(format!(
                "Password must be at least {} characters long!",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// --- Transport ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: u16,
    pub body: String,
}

pub trait AuthTransport: Send + Sync {
    fn send(&self, request: &AuthRequest) -> Result<AuthResponse, AuthError>;
}

pub struct HttpAuthTransport {
    client: reqwest::blocking::Client,
}

impl HttpAuthTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl AuthTransport for HttpAuthTransport {
    fn send(&self, request: &AuthRequest) -> Result<AuthResponse, AuthError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().map_err(|e| AuthError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| AuthError::Network(e.to_string()))?;
        Ok(AuthResponse { status, body })
    }
}

// --- Client ---

pub struct AuthClient {
    base_url: String,
    transport: Box<dyn AuthTransport>,
    store: Box<dyn KvStore>,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, transport: Box<dyn AuthTransport>, store: Box<dyn KvStore>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<T, AuthError> {
        let request = AuthRequest {
            method,
            url: self.url(path),
            bearer,
            body,
        };
        read_json(self.transport.send(&request)?)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Invalid("Missing email or password".to_string()));
        }
        let body = serde_json::json!({ "email": email, "password": password });
        let tokens: TokenPair = self.call(Method::Post, "/login", None, Some(body))?;
        self.save_tokens(&tokens)?;
        debug!(email, "logged in");
        Ok(tokens)
    }

    pub fn register(&self, registration: &Registration) -> Result<String, AuthError> {
        registration.validate()?;
        let body = serde_json::to_value(registration).map_err(|e| AuthError::Invalid(e.to_string()))?;
        let response: MessageResponse = self.call(Method::Post, "/register", None, Some(body))?;
        Ok(response
            .message
            .unwrap_or_else(|| "Registration successful!".to_string()))
    }

    pub fn refresh(&self) -> Result<String, AuthError> {
        let refresh_token = self
            .read_token(REFRESH_TOKEN_KEY, LEGACY_REFRESH_TOKEN_KEY)?
            .ok_or_else(|| AuthError::Invalid("Not logged in".to_string()))?;
        let response: RefreshResponse = self.call(Method::Post, "/refresh", Some(refresh_token), None)?;
        self.store.set(ACCESS_TOKEN_KEY, &response.access_token)?;
        Ok(response.access_token)
    }

    /// On a 401 the access token is refreshed once and the request retried;
    /// if the refresh fails the stored tokens are dropped.
    pub fn whoami(&self) -> Result<serde_json::Value, AuthError> {
        let access_token = self
            .access_token()?
            .ok_or_else(|| AuthError::Invalid("Not logged in".to_string()))?;

        match self.call(Method::Get, "/protected", Some(access_token), None) {
            Err(AuthError::Rejected { status: 401, .. }) => {
                debug!("access token rejected, refreshing");
                let renewed = match self.refresh() {
                    Ok(token) => token,
                    Err(e) => {
                        warn!(error = %e, "token refresh failed, clearing session");
                        self.logout()?;
                        return Err(e);
                    }
                };
                self.call(Method::Get, "/protected", Some(renewed), None)
            }
            other => other,
        }
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            LEGACY_ACCESS_TOKEN_KEY,
            LEGACY_REFRESH_TOKEN_KEY,
        ] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    pub fn save_tokens(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        self.store.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        Ok(())
    }

    pub fn access_token(&self) -> Result<Option<String>, AuthError> {
        self.read_token(ACCESS_TOKEN_KEY, LEGACY_ACCESS_TOKEN_KEY)
    }

    fn read_token(&self, key: &str, legacy_key: &str) -> Result<Option<String>, AuthError> {
        if let Some(token) = self.store.get(key)? {
            return Ok(Some(token));
        }
        let legacy = self.store.get(legacy_key)?;
        if legacy.is_some() {
            warn!(
                key = legacy_key,
                expected = key,
                "token found under legacy key; log in again to store it under the current name"
            );
        }
        Ok(legacy)
    }

    pub fn oauth_url(&self, provider: OAuthProvider) -> String {
        self.url(&format!("/login/{}", provider.path_segment()))
    }
}

fn read_json<T: DeserializeOwned>(response: AuthResponse) -> Result<T, AuthError> {
    if !(200..300).contains(&response.status) {
        let message = serde_json::from_str::<ErrorResponse>(&response.body)
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("Request failed with status code {}", response.status));
        return Err(AuthError::Rejected {
            status: response.status,
            message,
        });
    }
    serde_json::from_str(&response.body)
        .map_err(|e| AuthError::Network(format!("Failed to parse auth response: {}", e)))
}

pub fn parse_oauth_redirect(url: &str) -> Result<TokenPair, AuthError> {
    let fragment = url
        .rsplit_once('#')
        .map(|(_, f)| f)
        .ok_or_else(|| AuthError::Invalid("Redirect URL has no token fragment".to_string()))?;

    let mut access_token = None;
    let mut refresh_token = None;
    for pair in fragment.split('&') {
        match pair.split_once('=') {
            Some(("access_token", v)) if !v.is_empty() => access_token = Some(v.to_string()),
            Some(("refresh_token", v)) if !v.is_empty() => refresh_token = Some(v.to_string()),
            _ => {}
        }
    }

    match (access_token, refresh_token) {
        (Some(access_token), Some(refresh_token)) => Ok(TokenPair {
            access_token,
            refresh_token,
        }),
        _ => Err(AuthError::Invalid(
            "Redirect URL is missing access_token or refresh_token".to_string(),
        )),
    }
}
