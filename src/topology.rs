//! The provisioned topology.
//!
//! One bucket, one container registry, the configured functions behind a
//! REST API, a schedule invoking a function through its own role, and a CDN
//! in front of the bucket. Every knob comes from an optional YAML file whose
//! fields all default to that layout.

use crate::cli::globals::GlobalArgs;
use crate::program::{Output, Program, ProgramError};
use crate::resources::{
    bucket::{bucket, upload_object, BucketConfig},
    cdn::{cdn, CdnConfig},
    function::{function, Function, FunctionConfig, FunctionEnv},
    gateway::{rest_gateway, Endpoint, GatewayConfig},
    http_gateway::{http_gateway, HttpGatewayConfig},
    normalize_name,
    registry::{registry, RegistryConfig},
    role::{role, RoleConfig},
    scheduler::{schedule, ScheduleConfig, ScheduleTarget},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{error, info};

pub const DEFAULT_SCHEDULE: &str = "cron(0 0 * * ? *)";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologyConfig {
    pub uploads: Vec<UploadSettings>,
    pub registry: RegistrySettings,
    pub functions: Vec<FunctionSettings>,
    pub endpoints: Vec<EndpointSettings>,
    pub stage: String,
    pub schedule: Option<ScheduleSettings>,
    pub cdn: CdnSettings,
    pub http_api: Option<HttpApiSettings>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            uploads: Vec::new(),
            registry: RegistrySettings::default(),
            functions: vec![FunctionSettings::default()],
            endpoints: vec![EndpointSettings {
                method: "GET".to_string(),
                path: "/path/".to_string(),
                function: None,
            }],
            stage: "staging".to_string(),
            schedule: Some(ScheduleSettings::default()),
            cdn: CdnSettings::default(),
            http_api: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadSettings {
    pub path: PathBuf,
    /// Object key, the file name when unset.
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    pub mutable: bool,
    pub scan_on_push: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            mutable: true,
            scan_on_push: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunctionSettings {
    /// Logical name, the project name when unset.
    pub name: Option<String>,
    pub runtime: String,
    pub handler: Option<String>,
    pub codebase: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Dotenv file, takes precedence over `env`.
    pub env_file: Option<PathBuf>,
    pub layers: Vec<String>,
    pub timeout: Option<u32>,
    pub memory_size: Option<u32>,
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            name: None,
            runtime: "python3.13".to_string(),
            handler: Some("lambda_code.lambda_handler".to_string()),
            codebase: vec!["data/lambda_code.py".to_string()],
            env: BTreeMap::new(),
            env_file: None,
            layers: Vec::new(),
            timeout: None,
            memory_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSettings {
    pub method: String,
    pub path: String,
    /// Handling function, the first function when unset.
    #[serde(default)]
    pub function: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleSettings {
    pub expression: String,
    pub function: Option<String>,
    pub flexible_time_window: String,
    pub group_name: Option<String>,
    pub start_date: Option<String>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            expression: DEFAULT_SCHEDULE.to_string(),
            function: None,
            flexible_time_window: "OFF".to_string(),
            group_name: None,
            start_date: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CdnSettings {
    pub path_pattern: String,
    pub default_root_object: String,
    pub compress: bool,
    pub geo_locations: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

impl Default for CdnSettings {
    fn default() -> Self {
        Self {
            path_pattern: "media/*".to_string(),
            default_root_object: "index.html".to_string(),
            compress: false,
            geo_locations: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpApiSettings {
    #[serde(default)]
    pub function: Option<String>,
    pub methods: Vec<String>,
    pub paths: Vec<String>,
}

impl TopologyConfig {
    /// # Errors
    /// Returns an error if the document is not a valid topology.
    pub fn from_yaml(document: &str) -> Result<Self> {
        serde_yaml::from_str(document).context("Failed to parse topology")
    }

    /// Reads the topology file, or the default topology when none is given.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology file {}", path.display()))?;
        Self::from_yaml(&document).with_context(|| format!("Invalid topology file {}", path.display()))
    }
}

/// Builds the resource graph, logging and discarding any failure.
#[must_use]
pub fn build(globals: &GlobalArgs, config: &TopologyConfig) -> Option<Program> {
    match compose(globals, config) {
        Ok(program) => {
            info!(
                resources = program.resources().len(),
                outputs = program.outputs().len(),
                "program built"
            );
            Some(program)
        }
        Err(e) => {
            error!("Error in program. Diagnosis: {e:?}");
            None
        }
    }
}

/// Declares the whole topology on a new program.
///
/// # Errors
/// Returns the first declaration or packaging error.
pub fn compose(globals: &GlobalArgs, config: &TopologyConfig) -> Result<Program> {
    let project = globals.project.as_str();
    let mut program = Program::new(project, &globals.region);

    let store = bucket(&mut program, project, &BucketConfig::default())?;
    for upload in &config.uploads {
        let key = upload.key.clone().unwrap_or_else(|| {
            upload
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        upload_object(&mut program, &store, &upload.path, &key, Some(&store.policy))?;
    }

    registry(
        &mut program,
        project,
        &RegistryConfig {
            mutable: config.registry.mutable,
            scan_on_push: config.registry.scan_on_push,
        },
    )?;

    let mut functions = Functions::default();
    for settings in &config.functions {
        let name = settings.name.as_deref().unwrap_or(project);
        let handle = function(&mut program, name, &function_config(globals, settings))
            .with_context(|| format!("Failed to declare function {name}"))?;
        functions.insert(name, handle);
    }

    if !config.endpoints.is_empty() {
        let endpoints = config
            .endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                let handler = functions.resolve(endpoint.function.as_deref(), index + 1)?;
                Ok(Endpoint::new(&endpoint.method, &endpoint.path, handler))
            })
            .collect::<Result<Vec<_>, ProgramError>>()?;

        rest_gateway(
            &mut program,
            project,
            &endpoints,
            &GatewayConfig {
                stage: config.stage.clone(),
                ..GatewayConfig::default()
            },
        )?;
    }

    if let Some(settings) = &config.schedule {
        let target = functions
            .resolve(settings.function.as_deref(), 0)
            .context("Schedule target")?
            .clone();

        let invoker = role(
            &mut program,
            project,
            &RoleConfig {
                service: "scheduler.amazonaws.com".to_string(),
                actions: vec!["lambda:InvokeFunction".to_string()],
                resources: vec![target.arn()],
            },
        )?;

        schedule(
            &mut program,
            project,
            &ScheduleConfig {
                expression: settings.expression.clone(),
                target: ScheduleTarget {
                    arn: target.arn(),
                    role_arn: invoker.arn(),
                },
                flexible_time_window: settings.flexible_time_window.clone(),
                group_name: settings.group_name.clone(),
                start_date: settings.start_date.clone(),
            },
        )?;
    }

    cdn(
        &mut program,
        project,
        &store,
        &CdnConfig {
            path_pattern: config.cdn.path_pattern.clone(),
            default_root_object: config.cdn.default_root_object.clone(),
            compress: config.cdn.compress,
            geo_locations: config.cdn.geo_locations.clone(),
            tags: config.cdn.tags.clone(),
        },
    )?;

    if let Some(settings) = &config.http_api {
        let handler = functions
            .resolve(settings.function.as_deref(), 0)
            .context("HTTP API handler")?
            .clone();
        http_gateway(
            &mut program,
            project,
            &handler,
            &HttpGatewayConfig {
                methods: settings.methods.clone(),
                paths: settings.paths.clone(),
            },
        )?;
    }

    Ok(program)
}

fn function_config(globals: &GlobalArgs, settings: &FunctionSettings) -> FunctionConfig {
    let env = match &settings.env_file {
        Some(path) => FunctionEnv::File(path.clone()),
        None if settings.env.is_empty() => FunctionEnv::None,
        None => FunctionEnv::Vars(
            settings
                .env
                .iter()
                .map(|(key, value)| (key.clone(), Output::known(value.as_str())))
                .collect(),
        ),
    };

    FunctionConfig {
        runtime: settings.runtime.clone(),
        handler: settings.handler.clone(),
        codebase: settings.codebase.clone(),
        env,
        layers: settings.layers.clone(),
        role: None,
        timeout: settings.timeout,
        memory_size: settings.memory_size,
        artifact_dir: globals.artifact_dir(),
    }
}

// Declared functions in declaration order, looked up by normalized name.
#[derive(Default)]
struct Functions {
    handles: Vec<(String, Function)>,
}

impl Functions {
    fn insert(&mut self, name: &str, handle: Function) {
        self.handles.push((normalize_name(name), handle));
    }

    /// `index` is the 1-based endpoint position, 0 outside the endpoint list.
    fn resolve(&self, name: Option<&str>, index: usize) -> Result<&Function, ProgramError> {
        let found = match name {
            None => self.handles.first(),
            Some(name) => {
                let wanted = normalize_name(name);
                self.handles.iter().find(|(key, _)| *key == wanted)
            }
        };
        found
            .map(|(_, handle)| handle)
            .ok_or_else(|| ProgramError::UnknownHandler {
                index,
                handler: name.unwrap_or("<default>").to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals(work_dir: &Path) -> GlobalArgs {
        let mut globals = GlobalArgs::new(
            "Media".to_string(),
            "dev".to_string(),
            "eu-west-1".to_string(),
        );
        globals.work_dir = work_dir.to_path_buf();
        globals
    }

    #[test]
    fn test_default_topology() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let program = compose(&globals(dir.path()), &TopologyConfig::default())
            .unwrap_or_else(|e| panic!("compose: {e:?}"));

        let count = |kind: &str| program.resources_of_kind(kind).count();
        assert_eq!(count("aws:s3:BucketV2"), 1);
        assert_eq!(count("aws:ecr:Repository"), 1);
        assert_eq!(count("aws:lambda:Function"), 1);
        assert_eq!(count("aws:apigateway:RestApi"), 1);
        assert_eq!(count("aws:apigateway:Resource"), 1);
        assert_eq!(count("aws:scheduler:Schedule"), 1);
        assert_eq!(count("aws:cloudfront:Distribution"), 1);
        assert_eq!(count("aws:apigatewayv2:Api"), 0);

        for output in [
            "bucket_name",
            "bucket_arn",
            "ecr_uri",
            "media-function_name",
            "media-function_arn",
            "media-api-endpoint",
            "s3_distribution_id",
            "s3_distribution_domain_name",
        ] {
            assert!(program.outputs().contains_key(output), "missing {output}");
        }

        assert!(dir.path().join("artifacts/media.zip").is_file());
        assert!(program.to_yaml().is_ok());
    }

    #[test]
    fn test_topology_from_yaml() {
        let config = TopologyConfig::from_yaml(
            r"
functions:
  - name: channel
  - name: upload
endpoints:
  - method: GET
    path: /media/channel
    function: channel
  - method: POST
    path: /media/upload
    function: upload
  - method: GET
    path: /media/upload
    function: upload
schedule: null
http_api:
  methods: [GET]
  paths: [/health]
",
        )
        .unwrap_or_else(|e| panic!("from_yaml: {e:?}"));

        assert_eq!(config.functions.len(), 2);
        assert_eq!(config.functions[0].runtime, "python3.13");
        assert!(config.schedule.is_none());
        assert_eq!(config.cdn.path_pattern, "media/*");

        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let program =
            compose(&globals(dir.path()), &config).unwrap_or_else(|e| panic!("compose: {e:?}"));
        assert_eq!(program.resources_of_kind("aws:apigateway:Resource").count(), 3);
        assert_eq!(program.resources_of_kind("aws:lambda:Permission").count(), 3);
        assert_eq!(program.resources_of_kind("aws:scheduler:Schedule").count(), 0);
        assert_eq!(program.resources_of_kind("aws:apigatewayv2:Route").count(), 1);
    }

    #[test]
    fn test_endpoint_without_path_is_rejected() {
        let result = TopologyConfig::from_yaml("endpoints:\n  - method: GET\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_handler_yields_no_program() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let config = TopologyConfig {
            endpoints: vec![EndpointSettings {
                method: "GET".to_string(),
                path: "/items".to_string(),
                function: Some("missing".to_string()),
            }],
            ..TopologyConfig::default()
        };

        let error = compose(&globals(dir.path()), &config)
            .err()
            .and_then(|e| e.downcast::<ProgramError>().ok());
        assert!(matches!(
            error,
            Some(ProgramError::UnknownHandler { index: 1, handler }) if handler == "missing"
        ));
        assert!(build(&globals(dir.path()), &config).is_none());
    }

    #[test]
    fn test_load_without_path_is_default() {
        let config = TopologyConfig::load(None).unwrap_or_else(|e| panic!("load: {e:?}"));
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.stage, "staging");
    }
}
