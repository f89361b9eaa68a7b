//! Routes, the gatekeeper rule, and login redirect plumbing.

use std::fmt;

use super::intent::{Intent, IntentStore};
use crate::identity::{AuthSnapshot, BoxError, Claims, IdentityClient};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    VerifyEmail,
    Profile,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::VerifyEmail => "/verify-email",
            Self::Profile => "/profile",
        }
    }

    /// Match a path, ignoring any query string or fragment.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path {
            "/" | "" => Some(Self::Landing),
            "/verify-email" => Some(Self::VerifyEmail),
            "/profile" => Some(Self::Profile),
            _ => None,
        }
    }
}

impl From<Intent> for Route {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Verify => Self::VerifyEmail,
            Intent::Profile => Self::Profile,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}

impl Navigation {
    #[must_use]
    pub const fn replace(route: Route) -> Self {
        Self {
            route,
            replace: true,
        }
    }

    #[must_use]
    pub const fn push(route: Route) -> Self {
        Self {
            route,
            replace: false,
        }
    }
}

/// History/router the gate drives.
pub trait Navigator: Send + Sync {
    fn current(&self) -> Route;
    fn navigate(&self, navigation: Navigation);
}

impl<N: Navigator + ?Sized> Navigator for std::sync::Arc<N> {
    fn current(&self) -> Route {
        (**self).current()
    }

    fn navigate(&self, navigation: Navigation) {
        (**self).navigate(navigation);
    }
}

/// Where an auth state belongs, or `None` when no redirect should happen.
///
/// Loading sessions are left alone to avoid flicker; anonymous users stay put.
#[must_use]
pub fn decide(auth: &AuthSnapshot) -> Option<Route> {
    if auth.is_loading || !auth.is_authenticated {
        return None;
    }

    if auth.user.as_ref().is_some_and(Claims::is_email_verified) {
        Some(Route::Profile)
    } else {
        Some(Route::VerifyEmail)
    }
}

/// Re-evaluated on every auth state or claims change.
#[derive(Debug)]
pub struct Gatekeeper<N> {
    navigator: N,
}

impl<N: Navigator> Gatekeeper<N> {
    #[must_use]
    pub fn new(navigator: N) -> Self {
        Self { navigator }
    }

    #[must_use]
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Apply the rule; returns the navigation issued, if any.
    pub fn evaluate(&self, auth: &AuthSnapshot) -> Option<Navigation> {
        let target = decide(auth)?;
        if self.navigator.current() == target {
            return None;
        }

        let navigation = Navigation::replace(target);
        tracing::debug!(route = %target, "gatekeeper redirect");
        self.navigator.navigate(navigation);
        Some(navigation)
    }
}

/// Post-login target for a fresh login: the stored intent, else `/profile`.
#[must_use]
pub fn login_hint(intents: &IntentStore) -> Route {
    intents.intent_or_default().into()
}

/// Start a login redirect carrying the stored intent.
///
/// # Errors
/// Propagates the identity client's failure.
pub async fn login<I: IdentityClient>(identity: &I, intents: &IntentStore) -> Result<Route, BoxError> {
    let hint = login_hint(intents);
    identity.login(hint.path()).await?;
    Ok(hint)
}

/// Finish the login redirect: consume the stored intent and land on `return_to`.
pub fn complete_login<N: Navigator + ?Sized>(
    intents: &IntentStore,
    navigator: &N,
    return_to: Option<&str>,
) -> Navigation {
    intents.clear_intent();
    let route = return_to
        .and_then(Route::from_path)
        .unwrap_or(Route::Profile);
    let navigation = Navigation::replace(route);
    navigator.navigate(navigation);
    navigation
}
