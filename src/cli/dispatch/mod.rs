//! Map parsed CLI matches to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{identity, ARG_FRONTEND_BASE_URL, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let frontend_base_url = matches
        .get_one::<String>(ARG_FRONTEND_BASE_URL)
        .cloned()
        .context("missing required argument: --frontend-base-url")?;

    let identity_opts = identity::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        frontend_base_url,
        identity_domain: identity_opts.domain,
        identity_base_url: identity_opts.base_url,
        mgmt_client_id: identity_opts.client_id,
        mgmt_client_secret: identity_opts.client_secret,
        app_client_id: identity_opts.app_client_id,
    }))
}
