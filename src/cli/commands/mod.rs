pub mod identity;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("cruise0")
        .about("Email verification gate for Cruise0")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("CRUISE0_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend origin allowed by CORS")
                .env("CRUISE0_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        );

    let command = identity::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "cruise0",
        "--identity-domain",
        "tenant.us.auth0.com",
        "--mgmt-client-id",
        "mgmt",
        "--mgmt-client-secret",
        "secret",
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "cruise0");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Email verification gate for Cruise0".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("CRUISE0_PORT", None::<&str>),
                ("CRUISE0_FRONTEND_BASE_URL", None::<&str>),
                ("CRUISE0_LOG_LEVEL", None::<&str>),
            ],
            || {
                let matches = new().get_matches_from(REQUIRED);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<String>(ARG_FRONTEND_BASE_URL).cloned(),
                    Some("http://localhost:3000".to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(0)
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("CRUISE0_PORT", Some("9090")),
                ("CRUISE0_FRONTEND_BASE_URL", Some("https://cruise0.app")),
                ("CRUISE0_IDENTITY_DOMAIN", Some("tenant.us.auth0.com")),
                ("CRUISE0_MGMT_CLIENT_ID", Some("mgmt")),
                ("CRUISE0_MGMT_CLIENT_SECRET", Some("secret")),
            ],
            || {
                let matches = new().get_matches_from(vec!["cruise0"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9090));
                assert_eq!(
                    matches.get_one::<String>(ARG_FRONTEND_BASE_URL).cloned(),
                    Some("https://cruise0.app".to_string())
                );
            },
        );
    }

    #[test]
    fn test_missing_required() {
        temp_env::with_vars(
            [
                ("CRUISE0_IDENTITY_DOMAIN", None::<&str>),
                ("CRUISE0_MGMT_CLIENT_ID", None::<&str>),
                ("CRUISE0_MGMT_CLIENT_SECRET", None::<&str>),
            ],
            || {
                let result = new().try_get_matches_from(vec!["cruise0"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn test_verbosity_count() {
        temp_env::with_vars([("CRUISE0_LOG_LEVEL", None::<&str>)], || {
            let mut args = REQUIRED.to_vec();
            args.push("-vvv");
            let matches = new().get_matches_from(args);
            assert_eq!(
                matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                Some(3)
            );
        });
    }
}
