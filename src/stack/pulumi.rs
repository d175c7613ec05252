//! [`Stack`] backed by the `pulumi` CLI.
//!
//! The program is rendered into `Pulumi.yaml` inside the work directory and
//! every operation runs the CLI against that directory. Credentials travel
//! only through the child environment.

use crate::cli::globals::GlobalArgs;
use crate::program::{empty_project, Program};
use crate::stack::{Stack, StackError};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::BTreeMap, path::PathBuf, process::Stdio};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
};
use tracing::{debug, info, instrument, warn};

pub const PROJECT_FILE: &str = "Pulumi.yaml";

#[derive(Debug)]
pub struct PulumiStack {
    binary: String,
    work_dir: PathBuf,
    stack: String,
    envs: Vec<(&'static str, SecretString)>,
    has_program: bool,
}

#[derive(Debug, Deserialize)]
struct PluginInfo {
    name: String,
    kind: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigValue {
    #[serde(default)]
    value: Option<String>,
}

impl PulumiStack {
    /// Writes the project file for `program` and selects the stack, creating
    /// it when it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the project file cannot be written or the stack
    /// cannot be selected.
    pub async fn create_or_select(globals: &GlobalArgs, program: Option<&Program>) -> Result<Self> {
        tokio::fs::create_dir_all(&globals.work_dir)
            .await
            .with_context(|| format!("Failed to create {}", globals.work_dir.display()))?;

        let project = match program {
            Some(program) => program.to_yaml()?,
            None => empty_project(&globals.project)?,
        };
        let project_file = globals.work_dir.join(PROJECT_FILE);
        tokio::fs::write(&project_file, project)
            .await
            .with_context(|| format!("Failed to write {}", project_file.display()))?;
        debug!(path = %project_file.display(), "project file written");

        let mut envs = Vec::new();
        if !globals.access_token.expose_secret().is_empty() {
            envs.push(("PULUMI_ACCESS_TOKEN", globals.access_token.clone()));
        }
        if !globals.aws_access_key_id.is_empty() {
            envs.push((
                "AWS_ACCESS_KEY_ID",
                SecretString::from(globals.aws_access_key_id.clone()),
            ));
        }
        if !globals.aws_secret_access_key.expose_secret().is_empty() {
            envs.push(("AWS_SECRET_ACCESS_KEY", globals.aws_secret_access_key.clone()));
        }

        let stack = Self {
            binary: globals.pulumi_bin.clone(),
            work_dir: globals.work_dir.clone(),
            stack: globals.stack.clone(),
            envs,
            has_program: program.is_some(),
        };

        stack
            .exec(&["stack", "select", "--create", &stack.stack], false)
            .await
            .with_context(|| format!("Failed to create or select stack {}", stack.stack))?;
        info!("Using stack {} in {}", stack.stack, stack.work_dir.display());

        Ok(stack)
    }

    #[instrument(skip(self, stream), fields(stack = %self.stack))]
    async fn exec(&self, args: &[&str], stream: bool) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .arg("--cwd")
            .arg(&self.work_dir)
            .arg("--non-interactive")
            .env("PULUMI_SKIP_UPDATE_CHECK", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value.expose_secret());
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start {}", self.binary))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if stream {
                        info!("{line}");
                    }
                    lines.push(line);
                }
            }
            lines.join("\n")
        });

        let stderr_task = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    lines.push(line);
                }
            }
            lines.join("\n")
        });

        let status = child.wait().await?;
        let stdout = stdout_task.await?;
        let stderr = stderr_task.await?;

        if !status.success() {
            return Err(StackError::Engine {
                command: args.join(" "),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        if !stderr.trim().is_empty() {
            debug!("{}", stderr.trim());
        }

        Ok(stdout)
    }

    fn require_program(&self) -> Result<()> {
        if self.has_program {
            Ok(())
        } else {
            Err(StackError::NoProgram.into())
        }
    }

    async fn log_outputs(&self) {
        match self
            .exec(&["stack", "output", "--json", "--stack", &self.stack], false)
            .await
        {
            Ok(outputs) => info!("Stack outputs: {}", outputs.trim()),
            Err(e) => warn!("Failed to read stack outputs: {e:#}"),
        }
    }
}

impl Stack for PulumiStack {
    async fn plugin_installed(&self, name: &str, version: &str) -> Result<bool> {
        let listing = self.exec(&["plugin", "ls", "--json"], false).await?;
        plugin_listed(&listing, name, version)
    }

    async fn install_plugin(&self, name: &str, version: &str) -> Result<()> {
        self.exec(&["plugin", "install", "resource", name, version], true)
            .await
            .map(drop)
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let config = self
            .exec(&["config", "--json", "--stack", &self.stack], false)
            .await?;
        config_value(&config, key)
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.exec(&["config", "set", key, value, "--stack", &self.stack], false)
            .await
            .map(drop)
    }

    async fn up(&self) -> Result<()> {
        self.require_program()?;
        self.exec(
            &["up", "--yes", "--skip-preview", "--stack", &self.stack],
            true,
        )
        .await?;
        self.log_outputs().await;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.exec(&["refresh", "--yes", "--stack", &self.stack], true)
            .await
            .map(drop)
    }

    async fn cancel(&self) -> Result<()> {
        self.exec(&["cancel", "--yes", "--stack", &self.stack], true)
            .await
            .map(drop)
    }

    async fn export(&self) -> Result<Value> {
        let state = self
            .exec(&["stack", "export", "--stack", &self.stack], false)
            .await?;
        serde_json::from_str(&state).context("Failed to parse stack export")
    }

    async fn preview(&self) -> Result<Value> {
        self.require_program()?;
        let changes = self
            .exec(&["preview", "--json", "--stack", &self.stack], false)
            .await?;
        serde_json::from_str(&changes).context("Failed to parse preview result")
    }
}

fn plugin_listed(listing: &str, name: &str, version: &str) -> Result<bool> {
    let plugins: Vec<PluginInfo> = if listing.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(listing).context("Failed to parse plugin listing")?
    };
    let wanted = version.trim_start_matches('v');

    Ok(plugins.iter().any(|plugin| {
        plugin.kind == "resource"
            && plugin.name == name
            && plugin
                .version
                .as_deref()
                .is_some_and(|installed| installed.trim_start_matches('v') == wanted)
    }))
}

fn config_value(config: &str, key: &str) -> Result<Option<String>> {
    if config.trim().is_empty() {
        return Ok(None);
    }
    let mut entries: BTreeMap<String, ConfigValue> =
        serde_json::from_str(config).context("Failed to parse stack config")?;
    Ok(entries.remove(key).and_then(|entry| entry.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_listed() {
        let listing = r#"[
            {"name": "aws", "kind": "resource", "version": "6.70.0", "size": 1},
            {"name": "random", "kind": "resource", "version": "4.16.0", "size": 1}
        ]"#;
        assert!(plugin_listed(listing, "aws", "v6.70.0").unwrap_or(false));
        assert!(!plugin_listed(listing, "aws", "v6.71.0").unwrap_or(true));
        assert!(!plugin_listed(listing, "gcp", "v6.70.0").unwrap_or(true));
    }

    #[test]
    fn test_plugin_listed_empty_and_null() {
        assert!(!plugin_listed("", "aws", "v6.70.0").unwrap_or(true));
        assert!(!plugin_listed("[]", "aws", "v6.70.0").unwrap_or(true));
        assert!(plugin_listed("not json", "aws", "v6.70.0").is_err());
    }

    #[test]
    fn test_config_value() {
        let config = r#"{
            "aws:region": {"value": "eu-west-1", "secret": false, "objectValue": "eu-west-1"},
            "media:token": {"secret": true}
        }"#;
        assert_eq!(
            config_value(config, "aws:region").ok().flatten(),
            Some("eu-west-1".to_string())
        );
        assert_eq!(config_value(config, "media:token").ok().flatten(), None);
        assert_eq!(config_value(config, "aws:profile").ok().flatten(), None);
        assert_eq!(config_value("", "aws:region").ok().flatten(), None);
    }

    #[tokio::test]
    async fn test_create_or_select_writes_project_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let mut globals = GlobalArgs::new(
            "media".to_string(),
            "dev".to_string(),
            "eu-west-1".to_string(),
        );
        globals.work_dir = dir.path().join("work");
        // `false` ignores its arguments and exits non-zero
        globals.pulumi_bin = "false".to_string();

        let result = PulumiStack::create_or_select(&globals, None).await;

        assert!(result.is_err());
        let project = std::fs::read_to_string(dir.path().join("work").join(PROJECT_FILE))
            .unwrap_or_default();
        assert!(project.contains("name: media"));
        assert!(project.contains("runtime: yaml"));
    }

    #[tokio::test]
    async fn test_missing_program_blocks_up_and_preview() {
        let stack = PulumiStack {
            binary: "true".to_string(),
            work_dir: PathBuf::from("."),
            stack: "dev".to_string(),
            envs: Vec::new(),
            has_program: false,
        };
        let up = stack.up().await;
        assert!(matches!(
            up.as_ref().map_err(|e| e.downcast_ref::<StackError>()),
            Err(Some(StackError::NoProgram))
        ));
        assert!(stack.preview().await.is_err());
    }
}
