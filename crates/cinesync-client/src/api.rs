//! REST client for the room lifecycle API.

use cinesync_proto::rest::{CreateRoomRequest, LeaveResponse, RoomSnapshot};
use reqwest::StatusCode;

use crate::error::ClientError;

/// Room lifecycle operations against one server, on behalf of one
/// user. The caller identity rides in the `x-user-id` header on every
/// request.
#[derive(Debug, Clone)]
pub struct RoomApi {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl RoomApi {
    /// `base_url` without a trailing slash, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn create_room(&self, movie_id: &str) -> Result<RoomSnapshot, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/party/create", self.base_url))
            .header("x-user-id", &self.user_id)
            .json(&CreateRoomRequest {
                movie_id: movie_id.to_string(),
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn get_room(&self, room_id: &str) -> Result<RoomSnapshot, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/party/{room_id}", self.base_url))
            .header("x-user-id", &self.user_id)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn join_room(&self, room_id: &str) -> Result<RoomSnapshot, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/party/{room_id}/join", self.base_url))
            .header("x-user-id", &self.user_id)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/api/party/{room_id}/leave", self.base_url))
            .header("x-user-id", &self.user_id)
            .send()
            .await?;
        let _: LeaveResponse = Self::parse(response).await?;
        Ok(())
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::RoomNotFound),
            status if status.is_success() => Ok(response.json().await?),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ClientError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
