//! REST API gateway built from a list of endpoints.
//!
//! Paths are turned into a tree of path-segment resources keyed by their
//! full prefix, so `/media/channel` and `/media/upload` share one `media`
//! node under the API root. Each endpoint gets a method and a proxy
//! integration on its terminal node; each distinct handler gets a single
//! invoke permission.

use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::{function::Function, normalize_name};
use std::collections::BTreeMap;
use tracing::debug;

pub const ROOT: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub handler: Function,
}

impl Endpoint {
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>, handler: &Function) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            handler: handler.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Stage name, lowercased before use.
    pub stage: String,
    pub binary_media_types: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            stage: "staging".to_string(),
            binary_media_types: vec!["*/*".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gateway {
    pub api: ResourceRef,
    /// Path-segment nodes keyed by full prefix, root excluded.
    pub nodes: BTreeMap<String, ResourceRef>,
    /// Invoke permissions keyed by handler.
    pub permissions: BTreeMap<String, ResourceRef>,
    pub methods: Vec<ResourceRef>,
    pub integrations: Vec<ResourceRef>,
    pub deployment: ResourceRef,
    pub stage: ResourceRef,
    pub url: Output,
}

impl Gateway {
    /// Every path prefix with a node, root first.
    #[must_use]
    pub fn prefixes(&self) -> Vec<&str> {
        std::iter::once(ROOT)
            .chain(self.nodes.keys().map(String::as_str))
            .collect()
    }
}

/// Splits a path into its segments; an empty path is the root.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Declares a REST API routing `endpoints` to their handlers.
///
/// # Errors
/// Returns [`ProgramError::MalformedEndpoint`] before declaring anything if
/// an endpoint has no method, or any error raised while declaring.
pub fn rest_gateway(
    program: &mut Program,
    name: &str,
    endpoints: &[Endpoint],
    config: &GatewayConfig,
) -> Result<Gateway, ProgramError> {
    for (index, endpoint) in endpoints.iter().enumerate() {
        if endpoint.method.trim().is_empty() {
            return Err(ProgramError::MalformedEndpoint {
                index: index + 1,
                reason: "method must not be empty".to_string(),
            });
        }
    }

    let name = normalize_name(name);
    let stage_name = config.stage.trim().to_lowercase();

    let api = program.declare(
        ResourceSpec::new(format!("{name}-rest-api"), "aws:apigateway:RestApi")
            .set("name", &name)
            .set("description", format!("REST API Gateway for {name}"))
            .set("endpointConfiguration", Property::map([("types", "REGIONAL")]))
            .set("binaryMediaTypes", config.binary_media_types.clone()),
    )?;
    let root = api.output("rootResourceId");

    let mut nodes: BTreeMap<String, ResourceRef> = BTreeMap::new();
    let mut permissions: BTreeMap<String, ResourceRef> = BTreeMap::new();
    let mut methods = Vec::with_capacity(endpoints.len());
    let mut integrations = Vec::with_capacity(endpoints.len());

    for (index, endpoint) in endpoints.iter().enumerate() {
        let number = index + 1;

        let mut parent = root.clone();
        let mut prefix = String::new();
        for segment in segments(&endpoint.path) {
            prefix.push('/');
            prefix.push_str(segment);

            let node = match nodes.get(&prefix) {
                Some(node) => node.clone(),
                None => {
                    // numbered: distinct prefixes may differ only by case or punctuation
                    let node = program.declare(
                        ResourceSpec::new(
                            format!("{name}-resource-{}", nodes.len() + 1),
                            "aws:apigateway:Resource",
                        )
                        .set("restApi", api.id())
                        .set("parentId", parent.clone())
                        .set("pathPart", segment),
                    )?;
                    nodes.insert(prefix.clone(), node.clone());
                    node
                }
            };
            parent = node.id();
        }

        let method = program.declare(
            ResourceSpec::new(format!("{name}-method-{number}"), "aws:apigateway:Method")
                .set("restApi", api.id())
                .set("resourceId", parent.clone())
                .set("httpMethod", endpoint.method.trim().to_uppercase())
                .set("authorization", "NONE"),
        )?;

        let integration = program.declare(
            ResourceSpec::new(
                format!("{name}-integration-{number}"),
                "aws:apigateway:Integration",
            )
            .set("restApi", api.id())
            .set("resourceId", parent)
            .set("httpMethod", method.output("httpMethod"))
            .set("type", "AWS_PROXY")
            .set("integrationHttpMethod", "POST")
            .set("uri", endpoint.handler.invoke_arn())
            .depends_on(&method),
        )?;

        let handler = endpoint.handler.key().to_string();
        if !permissions.contains_key(&handler) {
            let permission = program.declare(
                ResourceSpec::new(
                    format!("{name}-api-permission-{number}"),
                    "aws:lambda:Permission",
                )
                .set("action", "lambda:InvokeFunction")
                .set("function", endpoint.handler.name())
                .set("principal", "apigateway.amazonaws.com")
                .set("sourceArn", api.output("executionArn").apply("{}/*")),
            )?;
            permissions.insert(handler, permission);
        }

        debug!(
            method = %endpoint.method,
            path = %endpoint.path,
            handler = %endpoint.handler.key(),
            "routed endpoint"
        );

        methods.push(method);
        integrations.push(integration);
    }

    // a deployment snapshots the API, so it waits for every route
    let deployment = program.declare(
        ResourceSpec::new(format!("{name}-deployment"), "aws:apigateway:Deployment")
            .set("restApi", api.id())
            .depends_on(&api)
            .depends_on_all(nodes.values())
            .depends_on_all(&methods)
            .depends_on_all(&integrations),
    )?;

    let stage = program.declare(
        ResourceSpec::new(format!("{name}-stage-{stage_name}"), "aws:apigateway:Stage")
            .set("restApi", api.id())
            .set("deployment", deployment.id())
            .set("stageName", &stage_name),
    )?;

    let url = api.id().apply(&format!(
        "https://{{}}.execute-api.{}.amazonaws.com/{stage_name}",
        program.region()
    ));
    program.export(format!("{name}-api-endpoint"), &url);

    Ok(Gateway {
        api,
        nodes,
        permissions,
        methods,
        integrations,
        deployment,
        stage,
        url,
    })
}
