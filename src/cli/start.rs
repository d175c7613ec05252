use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch, telemetry,
};
use anyhow::Result;
use tracing::debug;

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action dispatch fails
pub fn start() -> Result<Action> {
    // .env is read before parsing so its values act as env fallbacks
    let dotenv = dotenvy::dotenv().ok();

    let matches = commands::new().get_matches();

    let arg = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
    let deployment = telemetry::Deployment {
        project: arg("project"),
        stack: arg("stack"),
        region: arg("region"),
    };
    telemetry::init(logging::level(&matches), &deployment)?;

    if let Some(path) = dotenv {
        debug!("loaded environment from {}", path.display());
    }

    dispatch::handler(&matches)
}
