use anyhow::Result;
use stackwright::cli::{self, telemetry};
use tracing::error;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;
    if let Err(e) = &result {
        error!("Deployment failed: {e:#}");
    }

    telemetry::shutdown_tracer();

    result
}
