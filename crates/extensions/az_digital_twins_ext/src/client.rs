use crate::config::DigitalTwinsConfig;
use crate::config::DIGITAL_TWINS_RESOURCE;
use crate::error::DigitalTwinsClientError;
use crate::patch::PatchOperation;
use async_trait::async_trait;
use clock::Clock;
use clock::Timestamp;
use clock::WallClock;
use mockall::automock;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::IF_MATCH;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tracing::info;

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// `If-Match` value applying an update whatever the current etag of the twin
pub const UNCONDITIONAL: &str = "*";

const REQUEST_TIMEOUT: Duration = Duration::from_millis(10000);

/// Tokens are renewed when they expire within this delay
const TOKEN_REFRESH_MARGIN: time::Duration = time::Duration::minutes(5);

/// The Azure Digital Twins REST API, as far as the binding uses it
#[automock]
#[async_trait]
pub trait DigitalTwinsApi: Send + Sync {
    /// Apply a JSON patch to a twin
    async fn update_twin(
        &mut self,
        twin_id: &str,
        patch: &[PatchOperation],
    ) -> Result<(), DigitalTwinsClientError>;
}

/// Define an Azure Digital Twins endpoint
#[derive(Debug, Clone)]
pub struct AdtEndPoint {
    base_url: Url,
    api_version: String,
}

impl AdtEndPoint {
    pub fn try_new(
        instance_url: &str,
        api_version: &str,
    ) -> Result<Self, DigitalTwinsClientError> {
        let mut url = String::new();
        if !instance_url.starts_with("http") {
            url.push_str("https://");
        }
        url.push_str(instance_url);

        let base_url = Url::parse(&url)?;
        if base_url.cannot_be_a_base() {
            return Err(DigitalTwinsClientError::InvalidInstanceUrl(
                instance_url.to_string(),
            ));
        }

        Ok(AdtEndPoint {
            base_url,
            api_version: api_version.to_string(),
        })
    }

    pub fn get_url_for_twin(&self, twin_id: &str) -> Result<Url, DigitalTwinsClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DigitalTwinsClientError::InvalidInstanceUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("digitaltwins")
            .push(twin_id);
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);

        Ok(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: Timestamp,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: Timestamp) -> Self {
        AccessToken {
            token: token.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn is_fresh(&self, now: Timestamp) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[automock]
#[async_trait]
pub trait AccessTokenRetriever: Send + Sync {
    async fn get_access_token(&mut self) -> Result<AccessToken, DigitalTwinsClientError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Seconds,
}

/// The v1 token endpoint returns numbers as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn into_duration(self) -> Result<time::Duration, DigitalTwinsClientError> {
        let seconds = match self {
            Seconds::Number(n) => n,
            Seconds::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| DigitalTwinsClientError::InvalidTokenExpiry(text))?,
        };
        Ok(time::Duration::seconds(seconds))
    }
}

/// Retrieves access tokens using the OAuth2 client-credentials flow,
/// keeping the last token until it is about to expire.
pub struct ClientCredentialsTokenRetriever {
    http_con: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    clock: Box<dyn Clock>,
    cached: Option<AccessToken>,
}

impl ClientCredentialsTokenRetriever {
    pub fn new(
        http_con: reqwest::Client,
        config: &DigitalTwinsConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        ClientCredentialsTokenRetriever {
            http_con,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            clock,
            cached: None,
        }
    }

    async fn request_token(&self) -> Result<AccessToken, DigitalTwinsClientError> {
        let requested_at = self.clock.now();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", DIGITAL_TWINS_RESOURCE),
        ];

        let request = self
            .http_con
            .post(&self.token_url)
            .form(&form)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let response = self.http_con.execute(request).await?;
        let response = response.error_for_status()?;
        let token_response = response.json::<TokenResponse>().await?;
        let expires_in = token_response.expires_in.into_duration()?;
        let expires_at = requested_at.checked_add(expires_in).ok_or_else(|| {
            DigitalTwinsClientError::InvalidTokenExpiry(expires_in.whole_seconds().to_string())
        })?;

        Ok(AccessToken::new(token_response.access_token, expires_at))
    }
}

#[async_trait]
impl AccessTokenRetriever for ClientCredentialsTokenRetriever {
    async fn get_access_token(&mut self) -> Result<AccessToken, DigitalTwinsClientError> {
        let now = self.clock.now();
        if let Some(token) = self.cached.as_ref().filter(|token| token.is_fresh(now)) {
            return Ok(token.clone());
        }

        debug!("Requesting a new access token from {}", self.token_url);
        let token = self.request_token().await?;
        self.cached = Some(token.clone());
        Ok(token)
    }
}

/// A client of the Azure Digital Twins REST API authenticated with OAuth2 bearer tokens
pub struct OAuthDigitalTwinsClient {
    token_retriever: Box<dyn AccessTokenRetriever>,
    http_con: reqwest::Client,
    end_point: AdtEndPoint,
}

impl OAuthDigitalTwinsClient {
    pub fn new(
        token_retriever: Box<dyn AccessTokenRetriever>,
        http_con: reqwest::Client,
        end_point: AdtEndPoint,
    ) -> Self {
        OAuthDigitalTwinsClient {
            token_retriever,
            http_con,
            end_point,
        }
    }

    pub fn try_new(config: &DigitalTwinsConfig) -> Result<Self, DigitalTwinsClientError> {
        let http_con = reqwest::Client::builder().build()?;
        let end_point = AdtEndPoint::try_new(&config.adt_instance_url, &config.api_version)?;
        let token_retriever = Box::new(ClientCredentialsTokenRetriever::new(
            http_con.clone(),
            config,
            Box::new(WallClock),
        ));

        Ok(OAuthDigitalTwinsClient::new(
            token_retriever,
            http_con,
            end_point,
        ))
    }
}

#[async_trait]
impl DigitalTwinsApi for OAuthDigitalTwinsClient {
    async fn update_twin(
        &mut self,
        twin_id: &str,
        patch: &[PatchOperation],
    ) -> Result<(), DigitalTwinsClientError> {
        let token = self.token_retriever.get_access_token().await?;
        let url = self.end_point.get_url_for_twin(twin_id)?;
        let body = serde_json::to_vec(patch)?;

        info!("Calling API for twin ({twin_id}) with patch: {}", String::from_utf8_lossy(&body));

        let request = self
            .http_con
            .patch(url)
            .header(CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .header(IF_MATCH, UNCONDITIONAL)
            .bearer_auth(token.token())
            .body(body)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let response = self.http_con.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DigitalTwinsClientError::UpdateRejected {
            twin_id: twin_id.to_string(),
            status,
            body,
        })
    }
}
