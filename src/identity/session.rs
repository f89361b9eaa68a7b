//! Client-side view of the signed-in user.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Metadata the post-login action mirrors onto the user record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Signed claims about the current session's user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
    /// Namespaced custom claims (`https://cruise0.app/country`, ...).
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_app_metadata(mut self, metadata: AppMetadata) -> Self {
        self.app_metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_custom_claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Only an explicit `true` counts; absent means unverified.
    #[must_use]
    pub fn is_email_verified(&self) -> bool {
        self.email_verified == Some(true)
    }

    /// String value of a custom claim, ignoring empty strings.
    #[must_use]
    pub fn custom_claim(&self, key: &str) -> Option<&str> {
        self.custom
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Authentication state as exposed by the identity client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthSnapshot {
    /// A token refresh or redirect callback is still in flight.
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<Claims>,
}

impl AuthSnapshot {
    #[must_use]
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(user: Claims) -> Self {
        Self {
            is_loading: false,
            is_authenticated: true,
            user: Some(user),
        }
    }
}

/// Capabilities the gate consumes from the hosted identity SDK.
///
/// The application never mutates the session; it only asks for a refreshed copy.
pub trait IdentityClient: Send + Sync + 'static {
    /// Current cached state.
    fn snapshot(&self) -> AuthSnapshot;

    /// Refresh the session claims; `bypass_cache` forces a round-trip to the provider.
    fn fresh_claims(
        &self,
        bypass_cache: bool,
    ) -> impl Future<Output = Result<Claims, BoxError>> + Send;

    /// Access token for calling the app's own API.
    fn access_token(&self) -> impl Future<Output = Result<SecretString, BoxError>> + Send;

    /// Start a login redirect that returns to `return_to` afterwards.
    fn login(&self, return_to: &str) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// End the session and send the browser to `return_to`.
    fn logout(&self, return_to: &str) -> impl Future<Output = Result<(), BoxError>> + Send;
}
