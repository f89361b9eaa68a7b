use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

// Level names accepted in `CRUISE0_LOG_LEVEL`, in verbosity order.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Parse `CRUISE0_LOG_LEVEL`: a level name or its index (`0` = error).
///
/// # Errors
/// Returns a message listing the accepted names.
pub fn parse_log_level(level: &str) -> Result<u8, String> {
    let level = level.trim();
    if let Ok(index) = level.parse::<u8>() {
        return if usize::from(index) < LEVELS.len() {
            Ok(index)
        } else {
            Err(format!("log level index must be below {}", LEVELS.len()))
        };
    }

    LEVELS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level {level:?}, expected one of {}", LEVELS.join(", ")))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Repeat to log more: -v warnings, -vv requests and resend jobs, -vvv poll and storage details")
            .env("CRUISE0_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_log_level)),
    )
}
