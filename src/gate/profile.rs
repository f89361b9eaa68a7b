//! Profile view model.

use serde::Serialize;

use crate::identity::Claims;

pub const COUNTRY_CLAIM: &str = "https://cruise0.app/country";
pub const TIMEZONE_CLAIM: &str = "https://cruise0.app/timezone";
const FALLBACK_NAME: &str = "traveler";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub country: Option<String>,
    pub timezone: Option<String>,
}

impl From<&Claims> for ProfileView {
    fn from(claims: &Claims) -> Self {
        // Namespaced claims first, then the app_metadata mirror.
        let metadata = claims.app_metadata.as_ref();
        let country = claims
            .custom_claim(COUNTRY_CLAIM)
            .map(str::to_string)
            .or_else(|| metadata.and_then(|m| m.country.clone()));
        let timezone = claims
            .custom_claim(TIMEZONE_CLAIM)
            .map(str::to_string)
            .or_else(|| metadata.and_then(|m| m.timezone.clone()));

        Self {
            name: claims
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_NAME.to_string()),
            email: claims.email.clone(),
            email_verified: claims.is_email_verified(),
            country,
            timezone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AppMetadata;

    #[test]
    fn namespaced_claims_win_over_metadata() {
        let claims = Claims::new("auth0|1")
            .with_custom_claim(COUNTRY_CLAIM, "NZ")
            .with_app_metadata(AppMetadata {
                country: Some("AU".to_string()),
                timezone: Some("Australia/Sydney".to_string()),
            });
        let view = ProfileView::from(&claims);
        assert_eq!(view.country.as_deref(), Some("NZ"));
        assert_eq!(view.timezone.as_deref(), Some("Australia/Sydney"));
    }

    #[test]
    fn defaults_for_sparse_claims() {
        let view = ProfileView::from(&Claims::new("auth0|1").with_email("a@b.co"));
        assert_eq!(view.name, "traveler");
        assert_eq!(view.email.as_deref(), Some("a@b.co"));
        assert!(!view.email_verified);
        assert_eq!(view.country, None);
    }
}
