use crate::{Result, ScanError};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use url::Url;

/// JWT pair issued by `/api/accounts/login/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

impl AuthTokens {
    /// Tokens sit either at the top level or under `tokens`, depending on the
    /// login view the backend routes to.
    fn from_login_body(body: &Value) -> Option<Self> {
        let source = match body.get("tokens") {
            Some(nested) if nested.is_object() => nested,
            _ => body,
        };
        Some(Self {
            access: source.get("access")?.as_str()?.to_string(),
            refresh: source.get("refresh")?.as_str()?.to_string(),
        })
    }
}

pub struct AuthClient {
    client: Client,
    base: Url,
}

impl AuthClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        Ok(self.base.join(&format!("api/accounts/{}/", name))?)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Value> {
        let url = self.endpoint("register")?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(&json!({ "username": username, "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ScanError::Backend {
                status: status.as_u16(),
                message: describe_rejection(&body, "Registration failed"),
            });
        }

        info!("Registered account {}", username);
        Ok(body)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthTokens> {
        let url = self.endpoint("login")?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ScanError::AuthenticationFailed(describe_rejection(
                &body,
                "Invalid credentials",
            )));
        }

        AuthTokens::from_login_body(&body)
            .ok_or_else(|| ScanError::MalformedResponse("login response carried no tokens".to_string()))
    }

    pub async fn current_user(&self, access: &str) -> Result<Value> {
        let url = self.endpoint("user")?;
        debug!("GET {}", url);

        let response = self.client.get(url).bearer_auth(access).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ScanError::AuthenticationFailed(
                "stored session was rejected; log in again".to_string(),
            ));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ScanError::Backend {
                status: status.as_u16(),
                message: describe_rejection(&body, "Failed to fetch user"),
            });
        }
        Ok(body)
    }
}

/// Pull a readable message out of an error body: `error`, `detail`, or the
/// first field-level validation message.
fn describe_rejection(body: &Value, fallback: &str) -> String {
    for key in ["error", "detail", "message"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }

    if let Value::Object(map) = body {
        for (field, value) in map {
            let first = match value {
                Value::Array(items) => items.first().and_then(Value::as_str),
                Value::String(s) => Some(s.as_str()),
                _ => None,
            };
            if let Some(text) = first {
                return format!("{}: {}", field, text);
            }
        }
    }

    fallback.to_string()
}

/// Tokens persisted on disk between invocations. No expiry or refresh.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<AuthTokens>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, tokens: &AuthTokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(tokens)?)?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
