//! Resource graph for the provisioning engine.
//!
//! A [`Program`] collects resource declarations, invoke variables and stack
//! outputs in declaration order. Edges between resources are either implicit
//! (a property holds an [`Output`] referencing another resource) or explicit
//! (`dependsOn`). Every reference must point at something already declared,
//! so a program is always a valid graph and renders directly to a Pulumi YAML
//! project file.

pub mod error;
pub use self::error::ProgramError;

mod output;
pub use self::output::Output;

mod property;
pub use self::property::Property;

use self::property::function_call;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Handle to a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    name: String,
}

impl ResourceRef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deferred value of one of the resource's properties.
    #[must_use]
    pub fn output(&self, property: &str) -> Output {
        Output::reference(self.name.clone(), property)
    }

    #[must_use]
    pub fn id(&self) -> Output {
        self.output("id")
    }

    #[must_use]
    pub fn arn(&self) -> Output {
        self.output("arn")
    }
}

/// Declaration of a single resource, built before it is added to a program.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    name: String,
    kind: String,
    properties: BTreeMap<String, Property>,
    depends_on: Vec<ResourceRef>,
}

impl ResourceSpec {
    /// `kind` is the engine type token, e.g. `aws:s3:BucketV2`.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<Property>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn depends_on(mut self, resource: &ResourceRef) -> Self {
        if !self.depends_on.contains(resource) {
            self.depends_on.push(resource.clone());
        }
        self
    }

    #[must_use]
    pub fn depends_on_all<'a>(self, resources: impl IntoIterator<Item = &'a ResourceRef>) -> Self {
        resources
            .into_iter()
            .fold(self, |spec, resource| spec.depends_on(resource))
    }
}

/// A resource as recorded in the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub kind: String,
    pub properties: BTreeMap<String, Property>,
    pub depends_on: Vec<String>,
}

impl Resource {
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Invoke {
    function: String,
    arguments: BTreeMap<String, Property>,
    returns: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    project: String,
    region: String,
    variables: Vec<(String, Invoke)>,
    resources: Vec<Resource>,
    names: BTreeSet<String>,
    outputs: BTreeMap<String, Output>,
}

impl Program {
    #[must_use]
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
            variables: Vec::new(),
            resources: Vec::new(),
            names: BTreeSet::new(),
            outputs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Adds a resource to the graph.
    ///
    /// # Errors
    /// Returns an error if the name is empty or taken, or if the resource
    /// references or depends on anything not yet declared.
    pub fn declare(&mut self, spec: ResourceSpec) -> Result<ResourceRef, ProgramError> {
        self.claim_name(&spec.name)?;

        for property in spec.properties.values() {
            if let Some(reference) = property
                .references()
                .into_iter()
                .find(|reference| !self.names.contains(reference))
            {
                return Err(ProgramError::UnknownReference {
                    resource: spec.name,
                    reference,
                });
            }
        }

        let mut depends_on = Vec::with_capacity(spec.depends_on.len());
        for dependency in spec.depends_on {
            if !self.is_resource(&dependency.name) {
                return Err(ProgramError::UnknownDependency {
                    resource: spec.name,
                    dependency: dependency.name,
                });
            }
            depends_on.push(dependency.name);
        }

        debug!(name = %spec.name, kind = %spec.kind, "declared resource");

        self.names.insert(spec.name.clone());
        self.resources.push(Resource {
            name: spec.name.clone(),
            kind: spec.kind,
            properties: spec.properties,
            depends_on,
        });

        Ok(ResourceRef { name: spec.name })
    }

    /// Declares a variable holding the result of an engine function call.
    ///
    /// # Errors
    /// Returns an error if the variable name is empty or already taken.
    pub fn invoke<K, V>(
        &mut self,
        variable: &str,
        function: &str,
        arguments: impl IntoIterator<Item = (K, V)>,
        returns: Option<&str>,
    ) -> Result<Output, ProgramError>
    where
        K: Into<String>,
        V: Into<Property>,
    {
        self.claim_name(variable)?;
        self.names.insert(variable.to_string());
        self.variables.push((
            variable.to_string(),
            Invoke {
                function: function.to_string(),
                arguments: arguments
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
                returns: returns.map(str::to_string),
            },
        ));

        Ok(Output::variable(variable))
    }

    /// Returns the variable declared by an earlier [`Program::invoke`], if any.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<Output> {
        self.variables
            .iter()
            .any(|(variable, _)| variable == name)
            .then(|| Output::variable(name))
    }

    /// Records a stack output. A later export under the same key replaces it.
    pub fn export(&mut self, key: impl Into<String>, value: impl Into<Output>) {
        self.outputs.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.name == name)
    }

    pub fn resources_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .iter()
            .filter(move |resource| resource.kind == kind)
    }

    #[must_use]
    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Renders the Pulumi YAML project file.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ProgramError> {
        let mut document = project_header(&self.project);

        if !self.variables.is_empty() {
            let mut variables = Mapping::new();
            for (name, invoke) in &self.variables {
                variables.insert(Value::String(name.clone()), invoke.to_yaml());
            }
            document.insert("variables".into(), Value::Mapping(variables));
        }

        let mut resources = Mapping::new();
        for resource in &self.resources {
            resources.insert(Value::String(resource.name.clone()), resource.to_yaml());
        }
        document.insert("resources".into(), Value::Mapping(resources));

        if !self.outputs.is_empty() {
            let mut outputs = Mapping::new();
            for (key, value) in &self.outputs {
                outputs.insert(Value::String(key.clone()), Value::String(value.render()));
            }
            document.insert("outputs".into(), Value::Mapping(outputs));
        }

        Ok(serde_yaml::to_string(&Value::Mapping(document))?)
    }

    fn claim_name(&self, name: &str) -> Result<(), ProgramError> {
        if name.trim().is_empty() {
            return Err(ProgramError::EmptyName);
        }
        if self.names.contains(name) {
            return Err(ProgramError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn is_resource(&self, name: &str) -> bool {
        self.resources.iter().any(|resource| resource.name == name)
    }
}

/// Project file without a program, used when only stack state is needed.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn empty_project(project: &str) -> Result<String, ProgramError> {
    Ok(serde_yaml::to_string(&Value::Mapping(project_header(
        project,
    )))?)
}

fn project_header(project: &str) -> Mapping {
    let mut document = Mapping::new();
    document.insert("name".into(), Value::String(project.to_string()));
    document.insert("runtime".into(), Value::String("yaml".to_string()));
    document.insert(
        "description".into(),
        Value::String(format!("{project} provisioned by {}", env!("CARGO_PKG_NAME"))),
    );
    document
}

impl Resource {
    fn to_yaml(&self) -> Value {
        let mut mapping = Mapping::new();
        mapping.insert("type".into(), Value::String(self.kind.clone()));

        let properties = Property::Map(self.properties.clone()).to_yaml();
        if matches!(&properties, Value::Mapping(entries) if !entries.is_empty()) {
            mapping.insert("properties".into(), properties);
        }

        if !self.depends_on.is_empty() {
            let depends_on = self
                .depends_on
                .iter()
                .map(|name| Value::String(Output::variable(name.clone()).render()))
                .collect();
            let mut options = Mapping::new();
            options.insert("dependsOn".into(), Value::Sequence(depends_on));
            mapping.insert("options".into(), Value::Mapping(options));
        }

        Value::Mapping(mapping)
    }
}

impl Invoke {
    fn to_yaml(&self) -> Value {
        let mut call = Mapping::new();
        call.insert("function".into(), Value::String(self.function.clone()));
        call.insert(
            "arguments".into(),
            Property::Map(self.arguments.clone()).to_yaml(),
        );
        if let Some(returns) = &self.returns {
            call.insert("return".into(), Value::String(returns.clone()));
        }
        function_call("fn::invoke", Value::Mapping(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(program: &mut Program) -> ResourceRef {
        program
            .declare(ResourceSpec::new("media", "aws:s3:BucketV2").set("bucket", "media"))
            .unwrap_or_else(|e| panic!("declare bucket: {e}"))
    }

    #[test]
    fn test_declare_records_resource() {
        let mut program = Program::new("media", "eu-west-1");
        let bucket = bucket(&mut program);

        assert_eq!(bucket.name(), "media");
        assert_eq!(program.resources().len(), 1);
        assert_eq!(
            program.resource("media").map(|r| r.kind.as_str()),
            Some("aws:s3:BucketV2")
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut program = Program::new("media", "eu-west-1");
        bucket(&mut program);
        let result = program.declare(ResourceSpec::new("media", "aws:ecr:Repository"));
        assert!(matches!(result, Err(ProgramError::DuplicateName(name)) if name == "media"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut program = Program::new("media", "eu-west-1");
        let result = program.declare(ResourceSpec::new(" ", "aws:ecr:Repository"));
        assert!(matches!(result, Err(ProgramError::EmptyName)));
    }

    #[test]
    fn test_reference_must_be_declared() {
        let mut program = Program::new("media", "eu-west-1");
        let result = program.declare(
            ResourceSpec::new("acl", "aws:s3:BucketAclV2")
                .set("bucket", Output::reference("missing", "id")),
        );
        assert!(matches!(
            result,
            Err(ProgramError::UnknownReference { reference, .. }) if reference == "missing"
        ));
    }

    #[test]
    fn test_dependency_must_be_resource() {
        let mut program = Program::new("media", "eu-west-1");
        let account = program
            .invoke(
                "accountId",
                "aws:getCallerIdentity",
                Vec::<(String, Property)>::new(),
                Some("accountId"),
            )
            .unwrap_or_else(|e| panic!("invoke: {e}"));
        assert_eq!(account.render(), "${accountId}");

        let phantom = ResourceRef {
            name: "accountId".to_string(),
        };
        let result = program.declare(ResourceSpec::new("acl", "aws:s3:BucketAclV2").depends_on(&phantom));
        assert!(matches!(result, Err(ProgramError::UnknownDependency { .. })));
    }

    #[test]
    fn test_to_yaml_renders_options_and_outputs() {
        let mut program = Program::new("media", "eu-west-1");
        let bucket = bucket(&mut program);
        let controls = program
            .declare(
                ResourceSpec::new("media-ownership", "aws:s3:BucketOwnershipControls")
                    .set("bucket", bucket.id()),
            )
            .unwrap_or_else(|e| panic!("declare controls: {e}"));
        program
            .declare(
                ResourceSpec::new("media-acl", "aws:s3:BucketAclV2")
                    .set("bucket", bucket.id())
                    .set("acl", "private")
                    .depends_on(&controls),
            )
            .unwrap_or_else(|e| panic!("declare acl: {e}"));
        program.export("bucket_arn", bucket.arn());

        let yaml = program.to_yaml().unwrap_or_default();
        let document: Value = serde_yaml::from_str(&yaml).unwrap_or(Value::Null);

        assert_eq!(document["name"], Value::String("media".to_string()));
        assert_eq!(document["runtime"], Value::String("yaml".to_string()));
        assert_eq!(
            document["resources"]["media-acl"]["options"]["dependsOn"][0],
            Value::String("${media-ownership}".to_string())
        );
        assert_eq!(
            document["resources"]["media-acl"]["properties"]["bucket"],
            Value::String("${media.id}".to_string())
        );
        assert_eq!(
            document["outputs"]["bucket_arn"],
            Value::String("${media.arn}".to_string())
        );
    }

    #[test]
    fn test_to_yaml_preserves_declaration_order() {
        let mut program = Program::new("media", "eu-west-1");
        for name in ["zeta", "alpha", "mid"] {
            program
                .declare(ResourceSpec::new(name, "aws:ecr:Repository"))
                .unwrap_or_else(|e| panic!("declare {name}: {e}"));
        }
        let yaml = program.to_yaml().unwrap_or_default();
        let zeta = yaml.find("zeta:").unwrap_or(usize::MAX);
        let alpha = yaml.find("alpha:").unwrap_or(usize::MAX);
        let mid = yaml.find("mid:").unwrap_or(usize::MAX);
        assert!(zeta < alpha && alpha < mid);
    }

    #[test]
    fn test_empty_project_has_no_resources() {
        let yaml = empty_project("media").unwrap_or_default();
        let document: Value = serde_yaml::from_str(&yaml).unwrap_or(Value::Null);
        assert_eq!(document["name"], Value::String("media".to_string()));
        assert!(document.get("resources").is_none());
    }
}
