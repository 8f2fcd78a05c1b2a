//! AWS credential resolution
//!
//! Static keys from the environment win; otherwise the ECS container
//! credential endpoint is queried and the answer cached until shortly
//! before it expires.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::DEFAULT_TIMEOUT;
use crate::error::{ClientError, Result};

/// Link-local host of the ECS container credential endpoint
const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Refresh cached credentials this long before they expire
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// A set of AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    /// Whether these credentials are still good at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(expiration) => now + ChronoDuration::minutes(EXPIRY_MARGIN_MINUTES) < expiration,
            None => true,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Where credentials come from
#[derive(Debug, Clone)]
enum CredentialsSource {
    Static(Credentials),
    Container { uri: String },
}

/// Resolves and caches credentials for signed requests
#[derive(Debug)]
pub struct CredentialsProvider {
    source: CredentialsSource,
    client: Client,
    timeout: Duration,
    cached: RwLock<Option<Credentials>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

impl CredentialsProvider {
    /// Provider that always hands out the same credentials
    pub fn fixed(credentials: Credentials) -> Self {
        Self {
            source: CredentialsSource::Static(credentials),
            client: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            cached: RwLock::new(None),
        }
    }

    /// Provider that queries a container credential endpoint
    pub fn container(uri: impl Into<String>) -> Self {
        Self {
            source: CredentialsSource::Container { uri: uri.into() },
            client: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            cached: RwLock::new(None),
        }
    }

    /// Overrides the timeout of credential endpoint calls
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a provider from the standard environment variables
    ///
    /// - AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY / AWS_SESSION_TOKEN
    /// - AWS_CONTAINER_CREDENTIALS_RELATIVE_URI
    /// - AWS_CONTAINER_CREDENTIALS_FULL_URI
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let (Some(key), Some(secret)) = (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            let mut credentials = Credentials::new(key, secret);
            credentials.session_token = var("AWS_SESSION_TOKEN");
            return Ok(Self::fixed(credentials));
        }

        if let Some(relative) = var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
            return Ok(Self::container(format!(
                "{}{}",
                CONTAINER_CREDENTIALS_HOST, relative
            )));
        }

        if let Some(full) = var("AWS_CONTAINER_CREDENTIALS_FULL_URI") {
            return Ok(Self::container(full));
        }

        Err(ClientError::Credentials(
            "no static keys or container credential endpoint configured".to_string(),
        ))
    }

    /// Returns usable credentials, refreshing from the source when needed
    pub async fn credentials(&self) -> Result<Credentials> {
        let uri = match &self.source {
            CredentialsSource::Static(credentials) => return Ok(credentials.clone()),
            CredentialsSource::Container { uri } => uri,
        };

        if let Some(credentials) = self.cached.read().await.as_ref() {
            if credentials.is_fresh(Utc::now()) {
                return Ok(credentials.clone());
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(credentials) = cached.as_ref() {
            if credentials.is_fresh(Utc::now()) {
                return Ok(credentials.clone());
            }
        }

        debug!("Refreshing container credentials");
        let credentials = self.fetch_container_credentials(uri).await?;
        *cached = Some(credentials.clone());
        Ok(credentials)
    }

    async fn fetch_container_credentials(&self, uri: &str) -> Result<Credentials> {
        let mut request = self.client.get(uri).timeout(self.timeout);
        if let Ok(token) = std::env::var("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
            request = request.header("Authorization", token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Credentials(format!(
                "container credential endpoint returned {}: {}",
                status, text
            )));
        }

        let body: ContainerCredentials = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Invalid container credentials: {}", e)))?;

        Ok(Credentials {
            access_key_id: body.access_key_id,
            secret_access_key: body.secret_access_key,
            session_token: body.token,
            expiration: body.expiration,
        })
    }
}
