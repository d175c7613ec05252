//! Stack lifecycle orchestration.
//!
//! A run validates the requested operation, prepares the stack (provider
//! plugin, region config, refresh) and then performs exactly one lifecycle
//! operation. The platform itself sits behind the [`Stack`] trait.

pub mod error;
pub use self::error::StackError;

pub mod pulumi;

use anyhow::Result;
use serde_json::Value;
use std::{fmt, str::FromStr};
use tracing::{error, info};

pub const AWS_PLUGIN: &str = "aws";
pub const AWS_PLUGIN_VERSION: &str = "v6.70.0";
pub const REGION_KEY: &str = "aws:region";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Up,
    Refresh,
    Cancel,
    Export,
    Preview,
}

impl Operation {
    pub const ALL: [Self; 5] = [
        Self::Up,
        Self::Refresh,
        Self::Cancel,
        Self::Export,
        Self::Preview,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Refresh => "refresh",
            Self::Cancel => "cancel",
            Self::Export => "export",
            Self::Preview => "preview",
        }
    }

    /// Capitalized name used in completion messages.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Refresh => "Refresh",
            Self::Cancel => "Cancel",
            Self::Export => "Export",
            Self::Preview => "Preview",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == wanted)
            .ok_or_else(|| StackError::UnknownOperation(s.to_string()))
    }
}

/// Result of a lifecycle operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    /// Stack snapshot (`export`) or proposed changes (`preview`).
    Payload(Value),
}

/// Provider setup applied before every operation.
#[derive(Debug, Clone)]
pub struct Setup {
    pub plugin: String,
    pub plugin_version: String,
    pub region: String,
}

impl Setup {
    #[must_use]
    pub fn aws(region: impl Into<String>) -> Self {
        Self {
            plugin: AWS_PLUGIN.to_string(),
            plugin_version: AWS_PLUGIN_VERSION.to_string(),
            region: region.into(),
        }
    }
}

/// The provisioning platform as seen by the orchestrator.
#[allow(async_fn_in_trait)]
pub trait Stack {
    async fn plugin_installed(&self, name: &str, version: &str) -> Result<bool>;

    async fn install_plugin(&self, name: &str, version: &str) -> Result<()>;

    async fn get_config(&self, key: &str) -> Result<Option<String>>;

    async fn set_config(&self, key: &str, value: &str) -> Result<()>;

    async fn up(&self) -> Result<()>;

    async fn refresh(&self) -> Result<()>;

    async fn cancel(&self) -> Result<()>;

    /// Snapshot of the stack state.
    async fn export(&self) -> Result<Value>;

    /// Proposed changes, nothing applied.
    async fn preview(&self) -> Result<Value>;
}

/// Ensures the provider plugin and region config, then refreshes.
///
/// Failures are logged and never propagated; a stack that could not be
/// prepared surfaces its problem in the operation that follows.
pub async fn setting_up_stack<S: Stack>(stack: &S, setup: &Setup) {
    if let Err(e) = prepare(stack, setup).await {
        error!("Failed to set up stack: {e:#}");
    }
}

async fn prepare<S: Stack>(stack: &S, setup: &Setup) -> Result<()> {
    if !stack
        .plugin_installed(&setup.plugin, &setup.plugin_version)
        .await?
    {
        info!(
            "Installing {} plugin {}...",
            setup.plugin, setup.plugin_version
        );
        stack
            .install_plugin(&setup.plugin, &setup.plugin_version)
            .await?;
    }

    if stack.get_config(REGION_KEY).await?.as_deref() != Some(setup.region.as_str()) {
        info!("Setting up {REGION_KEY} to {}...", setup.region);
        stack.set_config(REGION_KEY, &setup.region).await?;
    }

    info!("Refreshing stack...");
    handle_operation(stack, Operation::Refresh).await?;

    Ok(())
}

/// Performs a single lifecycle operation.
///
/// # Errors
/// Returns the platform error of the operation.
pub async fn handle_operation<S: Stack>(stack: &S, operation: Operation) -> Result<Outcome> {
    info!("Starting {operation} operation...");

    let outcome = match operation {
        Operation::Up => stack.up().await.map(|()| Outcome::Completed)?,
        Operation::Refresh => stack.refresh().await.map(|()| Outcome::Completed)?,
        Operation::Cancel => stack.cancel().await.map(|()| Outcome::Completed)?,
        Operation::Export => {
            let state = stack.export().await?;
            info!("Stack state: {state}");
            Outcome::Payload(state)
        }
        Operation::Preview => {
            let changes = stack.preview().await?;
            info!("Preview result: {changes}");
            Outcome::Payload(changes)
        }
    };

    info!("{} operation completed.", operation.title());

    Ok(outcome)
}

/// Validates `operation`, prepares the stack and runs the operation.
///
/// # Errors
/// Returns [`StackError::UnknownOperation`] before touching the platform, or
/// the error of the operation itself.
pub async fn run<S: Stack>(stack: &S, operation: &str, setup: &Setup) -> Result<Outcome> {
    let operation: Operation = operation.parse()?;

    setting_up_stack(stack, setup).await;

    handle_operation(stack, operation).await
}
