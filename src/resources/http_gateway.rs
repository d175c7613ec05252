use crate::program::{Output, Program, ProgramError, ResourceRef, ResourceSpec};
use crate::resources::{function::Function, normalize_name};

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub methods: Vec<String>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    pub api: ResourceRef,
    pub integration: ResourceRef,
    pub routes: Vec<ResourceRef>,
    pub stage: ResourceRef,
}

impl HttpGateway {
    #[must_use]
    pub fn endpoint(&self) -> Output {
        self.api.output("apiEndpoint")
    }
}

/// Declares an HTTP API proxying every `method x path` route to `handler`.
///
/// # Errors
/// Returns an error if a method or path is empty or a resource cannot be
/// declared.
pub fn http_gateway(
    program: &mut Program,
    name: &str,
    handler: &Function,
    config: &HttpGatewayConfig,
) -> Result<HttpGateway, ProgramError> {
    let name = normalize_name(name);

    let mut route_keys = Vec::with_capacity(config.methods.len() * config.paths.len());
    for method in &config.methods {
        for path in &config.paths {
            let (method, path) = (method.trim(), path.trim());
            if method.is_empty() || path.is_empty() {
                return Err(ProgramError::MalformedEndpoint {
                    index: route_keys.len() + 1,
                    reason: "route needs a method and a path".to_string(),
                });
            }
            route_keys.push(format!("{} {path}", method.to_uppercase()));
        }
    }

    let api = program.declare(
        ResourceSpec::new(format!("{name}-http-api"), "aws:apigatewayv2:Api")
            .set("name", &name)
            .set("protocolType", "HTTP")
            .set("description", format!("HTTP API Gateway for {name}")),
    )?;

    program.declare(
        ResourceSpec::new(format!("{name}-http-permission"), "aws:lambda:Permission")
            .set("action", "lambda:InvokeFunction")
            .set("function", handler.name())
            .set("principal", "apigateway.amazonaws.com")
            .set("sourceArn", api.output("executionArn").apply("{}/*/*/*")),
    )?;

    let integration = program.declare(
        ResourceSpec::new(format!("{name}-http-integration"), "aws:apigatewayv2:Integration")
            .set("apiId", api.id())
            .set("integrationType", "AWS_PROXY")
            .set("integrationUri", handler.invoke_arn())
            .set("payloadFormatVersion", "2.0"),
    )?;

    let mut routes = Vec::with_capacity(route_keys.len());
    for (index, route_key) in route_keys.into_iter().enumerate() {
        routes.push(
            program.declare(
                ResourceSpec::new(
                    format!("{name}-http-route-{}", index + 1),
                    "aws:apigatewayv2:Route",
                )
                .set("apiId", api.id())
                .set("routeKey", route_key)
                .set("target", integration.id().apply("integrations/{}")),
            )?,
        );
    }

    let stage = program.declare(
        ResourceSpec::new(format!("{name}-http-stage"), "aws:apigatewayv2:Stage")
            .set("apiId", api.id())
            .set("name", "$default")
            .set("autoDeploy", true)
            .depends_on_all(&routes),
    )?;

    program.export(format!("{name}-api_endpoint"), api.output("apiEndpoint"));

    Ok(HttpGateway {
        api,
        integration,
        routes,
        stage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Property;

    fn handler(program: &mut Program) -> Function {
        let resource = program
            .declare(ResourceSpec::new("processor-function", "aws:lambda:Function"))
            .unwrap_or_else(|e| panic!("declare: {e}"));
        Function { resource }
    }

    #[test]
    fn test_route_per_method_and_path() {
        let mut program = Program::new("media", "eu-west-1");
        let handler = handler(&mut program);
        let config = HttpGatewayConfig {
            methods: vec!["get".to_string(), "POST".to_string()],
            paths: vec!["/items".to_string(), "/items/{id}".to_string()],
        };
        let gateway = http_gateway(&mut program, "media", &handler, &config)
            .unwrap_or_else(|e| panic!("http gateway: {e}"));

        assert_eq!(gateway.routes.len(), 4);
        assert_eq!(
            program
                .resource("media-http-route-1")
                .and_then(|r| r.property("routeKey")),
            Some(&Property::from("GET /items"))
        );
        assert_eq!(
            program
                .resource(gateway.stage.name())
                .map(|r| r.depends_on.len()),
            Some(4)
        );
        assert!(program.outputs().contains_key("media-api_endpoint"));
    }

    #[test]
    fn test_default_stage_name_is_escaped_literal() {
        let mut program = Program::new("media", "eu-west-1");
        let handler = handler(&mut program);
        let config = HttpGatewayConfig {
            methods: vec!["GET".to_string()],
            paths: vec!["/".to_string()],
        };
        http_gateway(&mut program, "media", &handler, &config)
            .unwrap_or_else(|e| panic!("http gateway: {e}"));

        let yaml = program.to_yaml().unwrap_or_default();
        let document: serde_yaml::Value =
            serde_yaml::from_str(&yaml).unwrap_or(serde_yaml::Value::Null);
        assert_eq!(
            document["resources"]["media-http-stage"]["properties"]["name"],
            serde_yaml::Value::String("$default".to_string())
        );
    }

    #[test]
    fn test_empty_method_is_rejected() {
        let mut program = Program::new("media", "eu-west-1");
        let handler = handler(&mut program);
        let config = HttpGatewayConfig {
            methods: vec![String::new()],
            paths: vec!["/".to_string()],
        };
        assert!(matches!(
            http_gateway(&mut program, "media", &handler, &config),
            Err(ProgramError::MalformedEndpoint { .. })
        ));
    }
}
