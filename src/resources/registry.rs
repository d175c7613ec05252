use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::normalize_name;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub mutable: bool,
    pub scan_on_push: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mutable: true,
            scan_on_push: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    pub resource: ResourceRef,
}

impl Registry {
    #[must_use]
    pub fn repository_url(&self) -> Output {
        self.resource.output("repositoryUrl")
    }

    /// Image reference of the `latest` tag.
    #[must_use]
    pub fn latest_uri(&self) -> Output {
        self.repository_url().apply("{}:latest")
    }
}

/// Declares an ECR repository and exports its `latest` image URI as `ecr_uri`.
///
/// # Errors
/// Returns an error if the repository cannot be declared.
pub fn registry(
    program: &mut Program,
    name: &str,
    config: &RegistryConfig,
) -> Result<Registry, ProgramError> {
    let name = normalize_name(name);
    let mutability = if config.mutable { "MUTABLE" } else { "IMMUTABLE" };

    let resource = program.declare(
        ResourceSpec::new(format!("{name}-registry"), "aws:ecr:Repository")
            .set("name", &name)
            .set("imageTagMutability", mutability)
            .set(
                "imageScanningConfiguration",
                Property::map([("scanOnPush", config.scan_on_push)]),
            ),
    )?;

    let registry = Registry { resource };
    program.export("ecr_uri", registry.latest_uri());

    Ok(registry)
}
