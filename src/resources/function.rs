use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::{
    archive::{self, Codebase},
    assume_role_policy, normalize_name, policy_document,
};
use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Environment variables of a function.
#[derive(Debug, Clone, Default)]
pub enum FunctionEnv {
    #[default]
    None,
    Vars(BTreeMap<String, Output>),
    /// A dotenv-style file of `KEY=VALUE` lines.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub runtime: String,
    /// Entry point, `lambda.handler` when unset. Ignored for images.
    pub handler: Option<String>,
    pub codebase: Vec<String>,
    pub env: FunctionEnv,
    /// Layer ARNs (`arn:...`) or local layer archives.
    pub layers: Vec<String>,
    /// Execution role ARN. A default role is declared when unset.
    pub role: Option<Output>,
    pub timeout: Option<u32>,
    pub memory_size: Option<u32>,
    /// Where zipped codebases are written.
    pub artifact_dir: PathBuf,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            runtime: "python3.13".to_string(),
            handler: None,
            codebase: Vec::new(),
            env: FunctionEnv::None,
            layers: Vec::new(),
            role: None,
            timeout: None,
            memory_size: None,
            artifact_dir: PathBuf::from(".stackwright/artifacts"),
        }
    }
}

/// Handle to a declared function; its logical name is the handler identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Function {
    pub resource: ResourceRef,
}

impl Function {
    #[must_use]
    pub fn key(&self) -> &str {
        self.resource.name()
    }

    #[must_use]
    pub fn name(&self) -> Output {
        self.resource.output("name")
    }

    #[must_use]
    pub fn arn(&self) -> Output {
        self.resource.arn()
    }

    #[must_use]
    pub fn invoke_arn(&self) -> Output {
        self.resource.output("invokeArn")
    }
}

/// Declares a Lambda function from a zipped codebase or a container image.
///
/// # Errors
/// Returns an error if the codebase cannot be packaged or a resource cannot
/// be declared.
pub fn function(program: &mut Program, name: &str, config: &FunctionConfig) -> Result<Function> {
    let name = normalize_name(name);

    let codebase = archive::resolve(&config.codebase)
        .with_context(|| format!("Failed to resolve codebase of {name}"))?;

    let role = match &config.role {
        Some(role) => role.clone(),
        None => default_role(program, &name)?,
    };

    let mut spec = ResourceSpec::new(format!("{name}-function"), "aws:lambda:Function")
        .set("name", &name)
        .set("role", role)
        .set("timeout", config.timeout)
        .set("memorySize", config.memory_size);

    spec = match codebase {
        Codebase::Image(image) => {
            debug!(function = %name, image, "deploying container image");
            spec.set("packageType", "Image").set("imageUri", image)
        }
        Codebase::Archive(path) => zip_spec(program, spec, &name, config, absolute(&path)?)?,
        Codebase::Files(files) => {
            let destination = absolute(&config.artifact_dir.join(format!("{name}.zip")))?;
            archive::write_zip(&files, &destination)?;
            zip_spec(program, spec, &name, config, destination)?
        }
    };

    let variables = environment(&config.env)?;
    if !variables.is_empty() {
        spec = spec.set(
            "environment",
            Property::map([("variables", Property::map(variables))]),
        );
    }

    let resource = program.declare(spec)?;
    let function = Function { resource };

    program.export(format!("{name}-function_name"), function.name());
    program.export(format!("{name}-function_arn"), function.arn());

    Ok(function)
}

fn zip_spec(
    program: &mut Program,
    spec: ResourceSpec,
    name: &str,
    config: &FunctionConfig,
    archive: PathBuf,
) -> Result<ResourceSpec, ProgramError> {
    let layers = layers(program, name, config)?;
    let handler = config.handler.as_deref().unwrap_or("lambda.handler");

    let spec = spec
        .set("packageType", "Zip")
        .set("runtime", &config.runtime)
        .set("handler", handler)
        .set("code", Property::FileArchive(archive));

    Ok(if layers.is_empty() {
        spec
    } else {
        spec.set("layers", layers)
    })
}

fn layers(
    program: &mut Program,
    name: &str,
    config: &FunctionConfig,
) -> Result<Vec<Output>, ProgramError> {
    let mut arns = Vec::with_capacity(config.layers.len());

    for (index, layer) in config.layers.iter().enumerate() {
        if layer.starts_with("arn:") {
            arns.push(Output::known(layer.as_str()));
            continue;
        }

        let path = Path::new(layer)
            .canonicalize()
            .map_err(|_| ProgramError::MissingFile(PathBuf::from(layer)))?;
        let layer_name = format!("{name}-layer-{}", index + 1);
        let version = program.declare(
            ResourceSpec::new(layer_name.clone(), "aws:lambda:LayerVersion")
                .set("layerName", layer_name)
                .set("code", Property::FileArchive(path))
                .set("compatibleRuntimes", vec![config.runtime.as_str()]),
        )?;
        arns.push(version.arn());
    }

    Ok(arns)
}

fn default_role(program: &mut Program, name: &str) -> Result<Output, ProgramError> {
    let role = program.declare(
        ResourceSpec::new(format!("{name}-lambdaRole"), "aws:iam:Role")
            .set("assumeRolePolicy", assume_role_policy("lambda.amazonaws.com")),
    )?;

    let statement = |actions: Property, resource: &str| {
        Property::map([
            ("Effect", Property::from("Allow")),
            ("Action", actions),
            ("Resource", Property::from(resource)),
        ])
    };

    program.declare(
        ResourceSpec::new(format!("{name}-lambdaRolePolicy"), "aws:iam:RolePolicy")
            .set("role", role.id())
            .set(
                "policy",
                policy_document([
                    statement(Property::from("logs:*"), "arn:aws:logs:*:*:*"),
                    statement(Property::list(["s3:PutObject", "s3:GetObject"]), "*"),
                    statement(
                        Property::list(["ecr:GetDownloadUrlForLayer", "ecr:BatchGetImage"]),
                        "*",
                    ),
                ]),
            ),
    )?;

    Ok(role.arn())
}

fn environment(env: &FunctionEnv) -> Result<BTreeMap<String, Output>> {
    match env {
        FunctionEnv::None => Ok(BTreeMap::new()),
        FunctionEnv::Vars(variables) => Ok(variables.clone()),
        FunctionEnv::File(path) => {
            if !path.is_file() {
                warn!("No environment file found at {}", path.display());
                return Ok(BTreeMap::new());
            }
            let mut variables = BTreeMap::new();
            for item in dotenvy::from_path_iter(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
            {
                let (key, value) =
                    item.with_context(|| format!("Failed to parse {}", path.display()))?;
                variables.insert(key, Output::known(value));
            }
            Ok(variables)
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to read current directory")?
        .join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn program() -> Program {
        Program::new("media", "eu-west-1")
    }

    #[test]
    fn test_image_function_has_no_zip_fields() {
        let mut program = program();
        let config = FunctionConfig {
            codebase: vec!["123456789012.dkr.ecr.eu-west-1.amazonaws.com/app:latest".to_string()],
            ..FunctionConfig::default()
        };
        let handle = function(&mut program, "Processor", &config)
            .unwrap_or_else(|e| panic!("function: {e}"));

        let resource = program.resource(handle.key());
        assert_eq!(
            resource.and_then(|r| r.property("packageType")),
            Some(&Property::from("Image"))
        );
        assert!(resource.and_then(|r| r.property("handler")).is_none());
        assert!(resource.and_then(|r| r.property("code")).is_none());
    }

    #[test]
    fn test_default_role_is_declared() {
        let mut program = program();
        let handle = function(&mut program, "processor", &FunctionConfig::default())
            .unwrap_or_else(|e| panic!("function: {e}"));

        assert!(program.resource("processor-lambdaRole").is_some());
        assert!(program.resource("processor-lambdaRolePolicy").is_some());
        assert_eq!(
            program
                .resource(handle.key())
                .and_then(|r| r.property("role")),
            Some(&Property::from(Output::reference("processor-lambdaRole", "arn")))
        );
        assert!(program.outputs().contains_key("processor-function_arn"));
    }

    #[test]
    fn test_explicit_role_skips_default() {
        let mut program = program();
        let config = FunctionConfig {
            role: Some(Output::known("arn:aws:iam::123456789012:role/existing")),
            ..FunctionConfig::default()
        };
        function(&mut program, "processor", &config).unwrap_or_else(|e| panic!("function: {e}"));
        assert!(program.resource("processor-lambdaRole").is_none());
    }

    #[test]
    fn test_files_are_zipped_into_artifacts() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let code = dir.path().join("lambda_code.py");
        fs::write(&code, "def lambda_handler(event, context): pass")
            .unwrap_or_else(|e| panic!("write: {e}"));

        let mut program = program();
        let config = FunctionConfig {
            handler: Some("lambda_code.lambda_handler".to_string()),
            codebase: vec![code.to_string_lossy().into_owned()],
            artifact_dir: dir.path().join("artifacts"),
            ..FunctionConfig::default()
        };
        let handle =
            function(&mut program, "processor", &config).unwrap_or_else(|e| panic!("function: {e}"));

        let archive = dir.path().join("artifacts/processor.zip");
        assert!(archive.is_file());
        assert_eq!(
            program
                .resource(handle.key())
                .and_then(|r| r.property("code")),
            Some(&Property::FileArchive(archive))
        );
    }

    #[test]
    fn test_environment_file_and_layers() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let env_file = dir.path().join("function.env");
        fs::write(&env_file, "TABLE=media\nMODE=fast\n").unwrap_or_else(|e| panic!("write: {e}"));
        let layer = dir.path().join("layer.zip");
        fs::write(&layer, "").unwrap_or_else(|e| panic!("write: {e}"));

        let mut program = program();
        let config = FunctionConfig {
            env: FunctionEnv::File(env_file),
            layers: vec![
                "arn:aws:lambda:eu-west-1:123456789012:layer:shared:3".to_string(),
                layer.to_string_lossy().into_owned(),
            ],
            ..FunctionConfig::default()
        };
        let handle =
            function(&mut program, "processor", &config).unwrap_or_else(|e| panic!("function: {e}"));

        assert!(program.resource("processor-layer-2").is_some());
        let resource = program.resource(handle.key());
        assert_eq!(
            resource.and_then(|r| r.property("layers")),
            Some(&Property::list([
                Output::known("arn:aws:lambda:eu-west-1:123456789012:layer:shared:3"),
                Output::reference("processor-layer-2", "arn"),
            ]))
        );
        assert_eq!(
            resource.and_then(|r| r.property("environment")),
            Some(&Property::map([(
                "variables",
                Property::map([("MODE", "fast"), ("TABLE", "media")])
            )]))
        );
    }

    #[test]
    fn test_missing_environment_file_is_ignored() {
        let mut program = program();
        let config = FunctionConfig {
            env: FunctionEnv::File(PathBuf::from("does/not/exist.env")),
            ..FunctionConfig::default()
        };
        let handle =
            function(&mut program, "processor", &config).unwrap_or_else(|e| panic!("function: {e}"));
        assert!(program
            .resource(handle.key())
            .and_then(|r| r.property("environment"))
            .is_none());
    }
}
