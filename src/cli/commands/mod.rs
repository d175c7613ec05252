pub mod logging;

use crate::cli::globals::{DEFAULT_PULUMI_BIN, DEFAULT_WORK_DIR};
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

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

    let command = Command::new("stackwright")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("operation")
                .help("Stack operation: up, refresh, cancel, export, preview")
                .default_value("up"),
        )
        .arg(
            Arg::new("project")
                .short('p')
                .long("project")
                .help("Project name, also the base name of every resource")
                .env("PROJECT_NAME"),
        )
        .arg(
            Arg::new("stack")
                .short('s')
                .long("stack")
                .help("Stack name")
                .env("STACK_NAME"),
        )
        .arg(
            Arg::new("region")
                .short('r')
                .long("region")
                .help("AWS region")
                .env("REGION"),
        )
        .arg(
            Arg::new("access-token")
                .long("access-token")
                .help("Pulumi access token")
                .env("PULUMI_ACCESS_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("aws-access-key-id")
                .long("aws-access-key-id")
                .help("AWS access key id")
                .env("AWS_ACCESS_KEY_ID")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("aws-secret-access-key")
                .long("aws-secret-access-key")
                .help("AWS secret access key")
                .env("AWS_SECRET_ACCESS_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("work-dir")
                .short('w')
                .long("work-dir")
                .help("Directory holding the project file and packaged code")
                .default_value(DEFAULT_WORK_DIR)
                .env("STACKWRIGHT_WORK_DIR"),
        )
        .arg(
            Arg::new("topology")
                .short('t')
                .long("topology")
                .help("YAML topology file, the built-in layout when omitted")
                .env("STACKWRIGHT_TOPOLOGY"),
        )
        .arg(
            Arg::new("pulumi-bin")
                .long("pulumi-bin")
                .help("Pulumi executable")
                .default_value(DEFAULT_PULUMI_BIN)
                .env("STACKWRIGHT_PULUMI_BIN"),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 10] = [
        "PROJECT_NAME",
        "STACK_NAME",
        "REGION",
        "PULUMI_ACCESS_TOKEN",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "STACKWRIGHT_WORK_DIR",
        "STACKWRIGHT_TOPOLOGY",
        "STACKWRIGHT_PULUMI_BIN",
        "STACKWRIGHT_LOG_LEVEL",
    ];

    fn unset() -> Vec<(&'static str, Option<&'static str>)> {
        VARS.iter().map(|var| (*var, None)).collect()
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "stackwright");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(unset(), || {
            let matches = new().get_matches_from(vec!["stackwright"]);
            assert_eq!(
                matches.get_one::<String>("operation").cloned(),
                Some("up".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("work-dir").cloned(),
                Some(".stackwright".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("pulumi-bin").cloned(),
                Some("pulumi".to_string())
            );
            assert_eq!(matches.get_one::<String>("project"), None);
            assert_eq!(matches.get_one::<String>("topology"), None);
        });
    }

    #[test]
    fn test_check_args() {
        temp_env::with_vars(unset(), || {
            let matches = new().get_matches_from(vec![
                "stackwright",
                "preview",
                "--project",
                "media",
                "--stack",
                "dev",
                "--region",
                "eu-west-1",
                "--topology",
                "topology.yaml",
            ]);
            assert_eq!(
                matches.get_one::<String>("operation").cloned(),
                Some("preview".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("project").cloned(),
                Some("media".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("stack").cloned(),
                Some("dev".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("region").cloned(),
                Some("eu-west-1".to_string())
            );
            assert_eq!(
                matches.get_one::<String>("topology").cloned(),
                Some("topology.yaml".to_string())
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PROJECT_NAME", Some("media")),
                ("STACK_NAME", Some("prod")),
                ("REGION", Some("us-east-1")),
                ("PULUMI_ACCESS_TOKEN", Some("pul-123")),
                ("AWS_ACCESS_KEY_ID", Some("AKIA")),
                ("AWS_SECRET_ACCESS_KEY", Some("secret")),
                ("STACKWRIGHT_WORK_DIR", Some("/tmp/stackwright")),
                ("STACKWRIGHT_TOPOLOGY", None),
                ("STACKWRIGHT_PULUMI_BIN", Some("/usr/local/bin/pulumi")),
                ("STACKWRIGHT_LOG_LEVEL", Some("debug")),
            ],
            || {
                let matches = new().get_matches_from(vec!["stackwright", "refresh"]);
                assert_eq!(
                    matches.get_one::<String>("project").cloned(),
                    Some("media".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("stack").cloned(),
                    Some("prod".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("access-token").cloned(),
                    Some("pul-123".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("aws-secret-access-key").cloned(),
                    Some("secret".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("work-dir").cloned(),
                    Some("/tmp/stackwright".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("pulumi-bin").cloned(),
                    Some("/usr/local/bin/pulumi".to_string())
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(3));
            },
        );
    }
}
