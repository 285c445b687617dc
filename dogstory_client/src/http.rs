//! HTTP backend.
//!
//! Thin reqwest wrapper over the game server's JSON API. Every authorized call
//! carries the bearer token obtained from `join` (or supplied up front).

use std::time::Duration;

use async_trait::async_trait;
use dogstory_shared::{
    error::FetchError,
    map::MapDescription,
    net::{
        ActionRequest, JoinRequest, JoinResponse, MoveCommand, RecordEntry, Roster, StateResponse,
        API_PREFIX,
    },
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::client::Backend;

#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Joins a game and keeps the returned token for later calls.
    pub async fn join(&mut self, user_name: &str, map_id: &str) -> Result<JoinResponse, FetchError> {
        let request = self.http.post(self.url("/game/join")).json(&JoinRequest {
            user_name: user_name.to_string(),
            map_id: map_id.to_string(),
        });
        let joined: JoinResponse = read_json(send(request).await?).await?;
        info!(player = ?joined.player_id, "Joined game");
        self.token = Some(joined.auth_token.clone());
        Ok(joined)
    }

    pub async fn fetch_map(&self, map_id: &str) -> Result<MapDescription, FetchError> {
        let request = self.http.get(self.url(&format!("/maps/{map_id}")));
        read_json(send(request).await?).await
    }

    /// Fetches one page of the records table.
    pub async fn fetch_records(&self, start: u32, max_items: u32) -> Result<Vec<RecordEntry>, FetchError> {
        let request = self
            .http
            .get(self.url("/game/records"))
            .query(&[("start", start), ("maxItems", max_items)]);
        read_json(send(request).await?).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, FetchError> {
    let response = request.send().await.map_err(FetchError::transport)?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::Unauthorized);
    }
    if !status.is_success() {
        return Err(FetchError::Transport(format!("HTTP {status}")));
    }
    Ok(response)
}

/// Body bytes go through serde_json so shape errors stay distinct from
/// transport errors.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let body = response.bytes().await.map_err(FetchError::transport)?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_snapshot(&self) -> Result<StateResponse, FetchError> {
        let request = self.authorized(self.http.get(self.url("/game/state")));
        let body = send(request)
            .await?
            .bytes()
            .await
            .map_err(FetchError::transport)?;
        StateResponse::from_json_slice(&body)
    }

    async fn fetch_roster(&self) -> Result<Roster, FetchError> {
        let request = self.authorized(self.http.get(self.url("/game/players")));
        read_json(send(request).await?).await
    }

    async fn send_action(&self, movement: MoveCommand) -> Result<(), FetchError> {
        debug!(movement = movement.symbol(), "Sending action");
        let request = self
            .authorized(self.http.post(self.url("/game/player/action")))
            .json(&ActionRequest { movement });
        send(request).await?;
        Ok(())
    }
}
