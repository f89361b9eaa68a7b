use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_IDENTITY_DOMAIN: &str = "identity-domain";
pub const ARG_IDENTITY_BASE_URL: &str = "identity-base-url";
pub const ARG_MGMT_CLIENT_ID: &str = "mgmt-client-id";
pub const ARG_MGMT_CLIENT_SECRET: &str = "mgmt-client-secret";
pub const ARG_APP_CLIENT_ID: &str = "app-client-id";

#[derive(Debug)]
pub struct Options {
    pub domain: String,
    pub base_url: Option<Url>,
    pub client_id: String,
    pub client_secret: SecretString,
    pub app_client_id: Option<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if a required value is missing or the base URL is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let domain = matches
            .get_one::<String>(ARG_IDENTITY_DOMAIN)
            .cloned()
            .context("missing required argument: --identity-domain")?;
        let client_id = matches
            .get_one::<String>(ARG_MGMT_CLIENT_ID)
            .cloned()
            .context("missing required argument: --mgmt-client-id")?;
        let client_secret = matches
            .get_one::<String>(ARG_MGMT_CLIENT_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --mgmt-client-secret")?;

        let base_url = matches
            .get_one::<String>(ARG_IDENTITY_BASE_URL)
            .map(|raw| Url::parse(raw).with_context(|| format!("Invalid identity base URL: {raw}")))
            .transpose()?;

        Ok(Self {
            domain,
            base_url,
            client_id,
            client_secret,
            app_client_id: matches.get_one::<String>(ARG_APP_CLIENT_ID).cloned(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_DOMAIN)
                .long(ARG_IDENTITY_DOMAIN)
                .help("Identity provider tenant domain, e.g. tenant.us.auth0.com")
                .env("CRUISE0_IDENTITY_DOMAIN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_BASE_URL)
                .long(ARG_IDENTITY_BASE_URL)
                .help("Override the provider base URL (defaults to https://<domain>/)")
                .env("CRUISE0_IDENTITY_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_MGMT_CLIENT_ID)
                .long(ARG_MGMT_CLIENT_ID)
                .help("Client id for the management API client-credentials grant")
                .env("CRUISE0_MGMT_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_MGMT_CLIENT_SECRET)
                .long(ARG_MGMT_CLIENT_SECRET)
                .help("Client secret for the management API client-credentials grant")
                .env("CRUISE0_MGMT_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_APP_CLIENT_ID)
                .long(ARG_APP_CLIENT_ID)
                .help("SPA client id forwarded with verification email jobs")
                .env("CRUISE0_APP_CLIENT_ID"),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("cruise0"))
    }

    #[test]
    fn parse_from_flags() {
        let matches = command().get_matches_from(vec![
            "cruise0",
            "--identity-domain",
            "tenant.us.auth0.com",
            "--mgmt-client-id",
            "mgmt",
            "--mgmt-client-secret",
            "s3cret",
            "--identity-base-url",
            "http://127.0.0.1:9000",
        ]);
        let options = Options::parse(&matches).unwrap();
        assert_eq!(options.domain, "tenant.us.auth0.com");
        assert_eq!(options.client_id, "mgmt");
        assert_eq!(options.client_secret.expose_secret(), "s3cret");
        assert_eq!(
            options.base_url.map(String::from),
            Some("http://127.0.0.1:9000/".to_string())
        );
        assert_eq!(options.app_client_id, None);
    }

    #[test]
    fn parse_from_env() {
        temp_env::with_vars(
            [
                ("CRUISE0_IDENTITY_DOMAIN", Some("tenant.eu.auth0.com")),
                ("CRUISE0_MGMT_CLIENT_ID", Some("mgmt-env")),
                ("CRUISE0_MGMT_CLIENT_SECRET", Some("secret-env")),
                ("CRUISE0_APP_CLIENT_ID", Some("spa-client")),
                ("CRUISE0_IDENTITY_BASE_URL", None::<&str>),
            ],
            || {
                let matches = command().get_matches_from(vec!["cruise0"]);
                let options = Options::parse(&matches).unwrap();
                assert_eq!(options.domain, "tenant.eu.auth0.com");
                assert_eq!(options.client_id, "mgmt-env");
                assert_eq!(options.app_client_id.as_deref(), Some("spa-client"));
                assert!(options.base_url.is_none());
            },
        );
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let matches = command().get_matches_from(vec![
            "cruise0",
            "--identity-domain",
            "tenant.us.auth0.com",
            "--mgmt-client-id",
            "mgmt",
            "--mgmt-client-secret",
            "s3cret",
        ]);
        let options = Options::parse(&matches).unwrap();
        assert!(!format!("{options:?}").contains("s3cret"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let matches = command().get_matches_from(vec![
            "cruise0",
            "--identity-domain",
            "tenant.us.auth0.com",
            "--mgmt-client-id",
            "mgmt",
            "--mgmt-client-secret",
            "s3cret",
            "--identity-base-url",
            "not a url",
        ]);
        assert!(Options::parse(&matches).is_err());
    }
}
