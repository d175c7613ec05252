//! Maps parsed CLI arguments to an action.

use crate::cli::{
    actions::{operation::Args, Action},
    globals::GlobalArgs,
};
use crate::stack::Operation;
use anyhow::Result;
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if the requested operation is not a lifecycle operation.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let operation: Operation = matches
        .get_one::<String>("operation")
        .map_or("up", String::as_str)
        .parse()?;

    let value = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();

    let mut globals = GlobalArgs::new(value("project"), value("stack"), value("region"));
    globals.set_access_token(SecretString::from(value("access-token")));
    globals.set_aws_credentials(
        value("aws-access-key-id"),
        SecretString::from(value("aws-secret-access-key")),
    );
    if let Some(work_dir) = matches.get_one::<String>("work-dir") {
        globals.work_dir = PathBuf::from(work_dir);
    }
    globals.topology = matches.get_one::<String>("topology").map(PathBuf::from);
    if let Some(pulumi_bin) = matches.get_one::<String>("pulumi-bin") {
        globals.pulumi_bin.clone_from(pulumi_bin);
    }

    Ok(Action::Run(Args { operation, globals }))
}
