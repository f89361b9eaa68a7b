//! Client for the app's own resend-verification endpoint.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use tracing::debug;
use url::Url;

use super::GateError;
use crate::APP_USER_AGENT;

/// Path of the resend endpoint served by [`crate::api`].
pub const RESEND_PATH: &str = "/api/resend-verification";

pub trait ResendApi: Send + Sync + 'static {
    /// Ask the backend to resend the verification email for the token's owner.
    fn resend(&self, access_token: &SecretString) -> impl Future<Output = Result<(), GateError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpResendApi {
    endpoint: Url,
    http: Client,
}

impl HttpResendApi {
    /// `app_base_url` is the origin serving the API, e.g. `https://cruise0.app`.
    ///
    /// # Errors
    /// Returns an error if the endpoint URL cannot be formed or the client cannot be built.
    pub fn new(app_base_url: &Url) -> Result<Self, GateError> {
        let endpoint = app_base_url.join(RESEND_PATH)?;
        let http = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self { endpoint, http })
    }

    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ResendApi for HttpResendApi {
    async fn resend(&self, access_token: &SecretString) -> Result<(), GateError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        debug!(%status, "resend endpoint refused request");
        Err(GateError::Resend {
            status: status.as_u16(),
        })
    }
}
