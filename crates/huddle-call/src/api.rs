//! HTTP client for the login and room-creation endpoints.

use std::time::Duration;

use huddle_common::{HuddleError, RoomId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Bearer token returned by a successful login.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn default_token_type() -> String {
    "bearer".into()
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    room_id: RoomId,
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, HuddleError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HuddleError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `POST /auth/login`.
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, HuddleError> {
        debug!(username, "login request");
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| HuddleError::Network(e.to_string()))?;
        let token: AccessToken = read_json(response).await?;
        info!(username, "logged in");
        Ok(token)
    }

    /// `POST /rooms/create` with bearer auth.
    pub async fn create_room(&self, token: &str) -> Result<RoomId, HuddleError> {
        let response = self
            .http
            .post(self.url("/rooms/create"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| HuddleError::Network(e.to_string()))?;
        let created: CreateRoomResponse = read_json(response).await?;
        info!(room = %created.room_id, "room created");
        Ok(created.room_id)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, HuddleError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(HuddleError::Network(format!("HTTP {status}: {text}")));
    }
    response
        .json()
        .await
        .map_err(|e| HuddleError::Network(format!("invalid response body: {e}")))
}
