use clap::{builder::ValueParser, parser::ValueSource, Arg, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: INFO)")
            .env("STACKWRIGHT_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

/// Log level selected by `-v` or `STACKWRIGHT_LOG_LEVEL`, INFO otherwise.
#[must_use]
pub fn level(matches: &ArgMatches) -> Level {
    let explicit = matches!(
        matches.value_source(ARG_VERBOSITY),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    );
    if !explicit {
        return Level::INFO;
    }

    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
