//! The `/verify-email` view: shown email, poller lifetime and the view's buttons.

use std::sync::Arc;
use tracing::debug;

use super::foreground::ForegroundSource;
use super::intent::{Intent, IntentStore};
use super::poller::{CheckOutcome, PollSnapshot, PollerHandle, VerificationPoller};
use super::resend::ResendApi;
use super::router::{self, Route};
use super::GateError;
use crate::identity::{BoxError, Claims, IdentityClient};

const EMAIL_PLACEHOLDER: &str = "your email address";

/// Email to show: the `email` query parameter, then the session email, then a placeholder.
#[must_use]
pub fn displayed_email(query: Option<&str>, claims: Option<&Claims>) -> String {
    let from_query = query.and_then(|query| {
        url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .find(|(key, _)| key == "email")
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    });

    from_query
        .or_else(|| claims.and_then(|claims| claims.email.clone()))
        .filter(|email| !email.is_empty())
        .unwrap_or_else(|| EMAIL_PLACEHOLDER.to_string())
}

/// A mounted verify view. Dropping it stops polling.
pub struct VerifyView<I> {
    identity: Arc<I>,
    intents: IntentStore,
    logout_return_to: String,
    email: String,
    poller: PollerHandle,
}

impl<I: IdentityClient> VerifyView<I> {
    /// Mount the view: remember that verification is pending, then start polling.
    ///
    /// `query` is the page's query string; `logout_return_to` is the site origin.
    #[must_use]
    pub fn mount<R: ResendApi>(
        poller: VerificationPoller<I, R>,
        foreground: &dyn ForegroundSource,
        query: Option<&str>,
        logout_return_to: impl Into<String>,
    ) -> Self {
        let identity = poller.identity().clone();
        let intents = poller.intents().clone();
        intents.set_intent(Intent::Verify);

        let auth = identity.snapshot();
        let email = displayed_email(query, auth.user.as_ref());
        debug!(authenticated = auth.is_authenticated, "verify view mounted");

        Self {
            identity,
            intents,
            logout_return_to: logout_return_to.into(),
            email,
            poller: poller.mount(foreground),
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// "I've verified, check now".
    ///
    /// # Errors
    /// [`GateError::PollerStopped`] if the poller is gone.
    pub async fn check_now(&self) -> Result<CheckOutcome, GateError> {
        self.poller.force_check().await
    }

    /// # Errors
    /// See [`PollerHandle::resend_verification_email`].
    pub async fn resend(&self) -> Result<(), GateError> {
        self.poller.resend_verification_email().await
    }

    /// # Errors
    /// [`GateError::PollerStopped`] if the poller is gone.
    pub async fn snapshot(&self) -> Result<PollSnapshot, GateError> {
        self.poller.snapshot().await
    }

    /// Log out, keeping the verify intent so the next login comes back here.
    ///
    /// # Errors
    /// Propagates the identity client's failure.
    pub async fn logout(&self) -> Result<(), BoxError> {
        self.intents.set_intent(Intent::Verify);
        self.identity.logout(&self.logout_return_to).await
    }

    /// "I already verified, log me in": a login carrying the stored intent.
    ///
    /// # Errors
    /// Propagates the identity client's failure.
    pub async fn already_verified_login(&self) -> Result<Route, BoxError> {
        router::login(self.identity.as_ref(), &self.intents).await
    }

    /// Stop polling and wait until every timer is cleared.
    pub async fn unmount(self) {
        self.poller.unmount().await;
    }
}

impl<I> std::fmt::Debug for VerifyView<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyView")
            .field("email", &self.email)
            .field("logout_return_to", &self.logout_return_to)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_email_wins() {
        let claims = Claims::new("auth0|1").with_email("session@cruise0.app");
        assert_eq!(
            displayed_email(Some("?email=query%40cruise0.app"), Some(&claims)),
            "query@cruise0.app"
        );
    }

    #[test]
    fn session_email_then_placeholder() {
        let claims = Claims::new("auth0|1").with_email("session@cruise0.app");
        assert_eq!(
            displayed_email(Some("other=1"), Some(&claims)),
            "session@cruise0.app"
        );
        assert_eq!(displayed_email(Some("email="), None), "your email address");
        assert_eq!(displayed_email(None, None), "your email address");
    }
}
