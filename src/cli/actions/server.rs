use crate::{
    api,
    identity::{ManagementClient, ManagementConfig},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub frontend_base_url: String,
    pub identity_domain: String,
    pub identity_base_url: Option<Url>,
    pub mgmt_client_id: String,
    pub mgmt_client_secret: SecretString,
    pub app_client_id: Option<String>,
}

/// Build the management client from the parsed arguments.
///
/// # Errors
/// Returns an error if the domain is not a valid host or the HTTP client cannot be built.
pub fn management_client(args: &Args) -> Result<ManagementClient> {
    let mut config = ManagementConfig::new(
        args.identity_domain.clone(),
        args.mgmt_client_id.clone(),
        args.mgmt_client_secret.clone(),
    )
    .context("Invalid identity domain")?
    .with_app_client_id(args.app_client_id.clone());

    if let Some(base_url) = &args.identity_base_url {
        config = config.with_base_url(base_url.clone());
    }

    ManagementClient::new(config).context("Failed to build identity provider client")
}

/// Execute the server action.
/// # Errors
/// Returns an error if the identity client cannot be configured or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let client = management_client(&args)?;

    api::new(args.port, client, &args.frontend_base_url).await
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        frontend_base_url = %args.frontend_base_url,
        identity_domain = %args.identity_domain,
        identity_base_url = args.identity_base_url.as_ref().map_or("default", Url::as_str),
        mgmt_client_id = %args.mgmt_client_id,
        app_client_id = args.app_client_id.as_deref().unwrap_or("none"),
        "Starting server"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            frontend_base_url: "http://localhost:3000".to_string(),
            identity_domain: "tenant.us.auth0.com".to_string(),
            identity_base_url: Some("http://127.0.0.1:9000".parse().unwrap()),
            mgmt_client_id: "mgmt".to_string(),
            mgmt_client_secret: SecretString::from("secret".to_string()),
            app_client_id: Some("spa".to_string()),
        }
    }

    #[test]
    fn management_client_uses_overrides() {
        let client = management_client(&args()).unwrap();
        let config = client.config();
        assert_eq!(config.base_url().as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.audience(), "https://tenant.us.auth0.com/api/v2/");
        assert_eq!(config.app_client_id(), Some("spa"));
    }

    #[test]
    fn args_debug_hides_secret() {
        assert!(!format!("{:?}", args()).contains("\"secret\""));
    }
}
