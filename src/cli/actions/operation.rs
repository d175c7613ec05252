use crate::cli::globals::GlobalArgs;
use crate::stack::{self, pulumi::PulumiStack, Operation, Outcome, Setup};
use crate::topology::{self, TopologyConfig};
use anyhow::{Context, Result};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub operation: Operation,
    pub globals: GlobalArgs,
}

/// Builds the program, selects the stack and runs the requested operation.
/// # Errors
/// Returns an error if the topology cannot be loaded, the stack cannot be
/// selected, or the operation fails.
pub async fn execute(args: Args) -> Result<()> {
    let Args { operation, globals } = args;
    debug!("Global args: {:?}", globals);

    let config = TopologyConfig::load(globals.topology.as_deref())?;
    let program = topology::build(&globals, &config);

    let stack = PulumiStack::create_or_select(&globals, program.as_ref()).await?;

    let outcome = stack::run(&stack, operation.as_str(), &Setup::aws(&globals.region))
        .await
        .with_context(|| format!("Stack {operation} terminated"))?;

    if let Outcome::Payload(payload) = outcome {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    info!("Stack {} {operation} finished", globals.stack);

    Ok(())
}
