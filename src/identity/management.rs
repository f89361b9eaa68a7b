//! Server-side client for the identity provider.
//!
//! Resending a verification email takes three sequential calls, none retried:
//! 1. `GET /userinfo` with the caller's token to learn its subject.
//! 2. `POST /oauth/token` with the client-credentials grant for a management token.
//! 3. `POST /api/v2/jobs/verification-email` for that subject.
//!
//! Any failure short-circuits the sequence.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info_span, instrument, Instrument};
use url::Url;

use super::Error;
use crate::APP_USER_AGENT;

const USERINFO_PATH: &str = "userinfo";
const TOKEN_PATH: &str = "oauth/token";
const VERIFICATION_JOB_PATH: &str = "api/v2/jobs/verification-email";
const CLIENT_CREDENTIALS: &str = "client_credentials";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Connection settings for the provider's management API.
#[derive(Clone)]
pub struct ManagementConfig {
    domain: String,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
    app_client_id: Option<String>,
}

impl ManagementConfig {
    /// Build a config for a tenant domain such as `tenant.us.auth0.com`.
    ///
    /// # Errors
    /// Returns [`Error::Url`] if the domain does not form a valid URL.
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self, Error> {
        let domain = domain.into();
        let domain = domain.trim().trim_end_matches('/').to_string();
        let base_url = Url::parse(&format!("https://{domain}/"))?;

        Ok(Self {
            domain,
            base_url,
            client_id: client_id.into(),
            client_secret,
            app_client_id: None,
        })
    }

    /// Send provider requests somewhere other than `https://<domain>/`.
    ///
    /// The management audience keeps pointing at the tenant domain.
    #[must_use]
    pub fn with_base_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = url;
        self
    }

    /// SPA client id forwarded with verification jobs.
    #[must_use]
    pub fn with_app_client_id(mut self, client_id: Option<String>) -> Self {
        self.app_client_id = client_id.filter(|id| !id.trim().is_empty());
        self
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn app_client_id(&self) -> Option<&str> {
        self.app_client_id.as_deref()
    }

    /// Management API audience, always derived from the tenant domain.
    #[must_use]
    pub fn audience(&self) -> String {
        format!("https://{}/api/v2/", self.domain)
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Into::into)
    }
}

impl std::fmt::Debug for ManagementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementConfig")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("app_client_id", &self.app_client_id)
            .finish()
    }
}

/// Subset of the provider's `/userinfo` response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

/// Job accepted by the management API.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerificationJob {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Serialize)]
struct ClientCredentialsRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct VerificationJobRequest<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
}

/// Thin client over the provider endpoints the resend flow needs.
#[derive(Clone, Debug)]
pub struct ManagementClient {
    config: ManagementConfig,
    http: reqwest::Client,
}

impl ManagementClient {
    /// # Errors
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: ManagementConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ManagementConfig {
        &self.config
    }

    /// Map a caller's access token to its user record.
    ///
    /// # Errors
    /// [`Error::InvalidUserToken`] when the provider rejects the token,
    /// [`Error::Http`] on transport or decoding failure.
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, Error> {
        let response = self
            .http
            .get(self.config.endpoint(USERINFO_PATH)?)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "userinfo rejected caller token");
            return Err(Error::InvalidUserToken);
        }

        response.json::<UserInfo>().await.map_err(Into::into)
    }

    /// Obtain a service-to-service token for the management API.
    ///
    /// # Errors
    /// [`Error::ManagementToken`] with the upstream body when the grant is refused.
    pub async fn management_token(&self) -> Result<SecretString, Error> {
        let audience = self.config.audience();
        let request = ClientCredentialsRequest {
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.expose_secret(),
            audience: &audience,
            grant_type: CLIENT_CREDENTIALS,
        };

        let response = self
            .http
            .post(self.config.endpoint(TOKEN_PATH)?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(Error::ManagementToken { details });
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(SecretString::from(token.access_token))
    }

    /// Ask the provider to send a verification email to `user_id`.
    ///
    /// # Errors
    /// [`Error::VerificationJob`] with the upstream body when the job is refused.
    pub async fn create_verification_job(
        &self,
        management_token: &SecretString,
        user_id: &str,
    ) -> Result<VerificationJob, Error> {
        let request = VerificationJobRequest {
            user_id,
            client_id: self.config.app_client_id(),
        };

        let response = self
            .http
            .post(self.config.endpoint(VERIFICATION_JOB_PATH)?)
            .bearer_auth(management_token.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(Error::VerificationJob { details });
        }

        // The job body is informational; an empty or odd body is still a success.
        let body = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    /// Run the full resend sequence for the caller owning `access_token`.
    ///
    /// # Errors
    /// Propagates the first failing step.
    #[instrument(skip_all, fields(domain = %self.config.domain))]
    pub async fn resend_verification_email(
        &self,
        access_token: &str,
    ) -> Result<VerificationJob, Error> {
        let user = self
            .user_info(access_token)
            .instrument(info_span!("identity.userinfo"))
            .await?;

        let management_token = self
            .management_token()
            .instrument(info_span!("identity.management_token"))
            .await?;

        self.create_verification_job(&management_token, &user.sub)
            .instrument(info_span!("identity.verification_job", user_id = %user.sub))
            .await
    }
}
