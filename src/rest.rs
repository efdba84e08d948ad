use std::num::NonZeroU64;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{NodeConfig, ProtocolVersion};
use crate::error::{Error, Result};
use crate::model::error::ErrorResponse;
use crate::model::info::NodeInfo;
use crate::model::load::LoadResult;
use crate::model::player::PlayerUpdate;

/// Request/response client of a single node.
#[derive(Clone)]
pub(crate) struct RestClient {
    http: Client,
    base: String,
    password: String,
    version: ProtocolVersion
}

impl RestClient {
    pub(crate) fn new(config: &NodeConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(crate::CLIENT_NAME)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base: config.http_url(),
            password: config.password.clone(),
            version: config.version
        }
    }

    fn prefix(&self) -> String {
        match self.version {
            ProtocolVersion::V3 => self.base.clone(),
            ProtocolVersion::V4 => format!("{}/v4", self.base)
        }
    }

    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult> {
        let url = format!(
            "{}/loadtracks?identifier={}",
            self.prefix(),
            urlencoding::encode(identifier)
        );
        debug!("Loading tracks for {identifier}");

        let value: Value = self.json(self.http.get(url)).await?;
        LoadResult::from_value(value).map_err(From::from)
    }

    pub async fn info(&self) -> Result<NodeInfo> {
        let url = match self.version {
            ProtocolVersion::V3 => format!("{}/v3/info", self.base),
            ProtocolVersion::V4 => format!("{}/v4/info", self.base)
        };

        self.json(self.http.get(url)).await
    }

    pub async fn update_player(
        &self,
        session: &str,
        guild: NonZeroU64,
        update: &PlayerUpdate
    ) -> Result<()> {
        let url = format!("{}/sessions/{session}/players/{guild}?noReplace=false", self.prefix());

        self.execute(self.http.patch(url).json(update)).await.map(|_| ())
    }

    /// Destroys a remote player, a missing player is not an error.
    pub async fn destroy_player(&self, session: &str, guild: NonZeroU64) -> Result<()> {
        let url = format!("{}/sessions/{session}/players/{guild}", self.prefix());

        match self.execute(self.http.delete(url)).await {
            Err(Error::Server { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(()),
            other => other.map(|_| ())
        }
    }

    pub async fn configure_resuming(&self, session: &str, timeout: Duration) -> Result<()> {
        let url = format!("{}/sessions/{session}", self.prefix());
        let body = json!({
            "resuming": true,
            "timeout": timeout.as_secs()
        });

        self.execute(self.http.patch(url).json(&body)).await.map(|_| ())
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.execute(request).await?
            .json()
            .await
            .map_err(From::from)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.header(AUTHORIZATION, &self.password)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status.canonical_reason().unwrap_or("unknown error").to_string()
        };

        Err(Error::Server {
            status: status.as_u16(),
            message
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use super::*;

    fn client(server: &MockServer, version: ProtocolVersion) -> RestClient {
        RestClient::new(&NodeConfig {
            host: "127.0.0.1".into(),
            port: server.address().port(),
            version,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn loads_tracks_with_encoded_identifier() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/loadtracks"))
            .and(query_param("identifier", "ytsearch:a b"))
            .and(header("Authorization", "youshallnotpass"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "loadType": "empty",
                "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server, ProtocolVersion::V4).load_tracks("ytsearch:a b").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn legacy_nodes_use_unversioned_route() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/loadtracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "loadType": "NO_MATCHES",
                "tracks": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server, ProtocolVersion::V3).load_tracks("x").await.is_ok());
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v4/sessions/abc/players/1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "timestamp": 1,
                "status": 400,
                "error": "Bad Request",
                "message": "invalid track",
                "path": "/v4/sessions/abc/players/1"
            })))
            .mount(&server)
            .await;

        let err = client(&server, ProtocolVersion::V4)
            .update_player("abc", NonZeroU64::new(1).unwrap(), &PlayerUpdate::stop())
            .await
            .unwrap_err();

        match err {
            Error::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid track");
            },
            other => panic!("unexpected error: {other}")
        }
    }

    #[tokio::test]
    async fn destroying_missing_player_is_ok() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v4/sessions/abc/players/1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server, ProtocolVersion::V4)
            .destroy_player("abc", NonZeroU64::new(1).unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unreachable_node_fails() {
        let rest = RestClient::new(&NodeConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..Default::default()
        });

        assert!(matches!(rest.load_tracks("x").await, Err(Error::Http(_))));
    }
}
