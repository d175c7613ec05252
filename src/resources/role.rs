use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::{assume_role_policy, normalize_name, policy_document};

#[derive(Debug, Clone)]
pub struct RoleConfig {
    /// Trusted service, e.g. `scheduler` or `scheduler.amazonaws.com`.
    pub service: String,
    pub actions: Vec<String>,
    pub resources: Vec<Output>,
}

#[derive(Debug, Clone)]
pub struct Role {
    pub resource: ResourceRef,
    pub policy: ResourceRef,
}

impl Role {
    #[must_use]
    pub fn arn(&self) -> Output {
        self.resource.arn()
    }
}

/// Expands a bare service name to its principal.
#[must_use]
pub fn service_principal(service: &str) -> String {
    let service = service.trim().to_lowercase();
    if service.contains('.') {
        service
    } else {
        format!("{service}.amazonaws.com")
    }
}

/// Declares a role assumable by `config.service` with an inline policy
/// allowing `config.actions` on `config.resources`.
///
/// # Errors
/// Returns an error if either resource cannot be declared.
pub fn role(program: &mut Program, name: &str, config: &RoleConfig) -> Result<Role, ProgramError> {
    let name = normalize_name(name);

    let resource = program.declare(
        ResourceSpec::new(format!("{name}-role"), "aws:iam:Role")
            .set("name", &name)
            .set(
                "assumeRolePolicy",
                assume_role_policy(&service_principal(&config.service)),
            ),
    )?;

    let policy = program.declare(
        ResourceSpec::new(format!("{name}-role-policy"), "aws:iam:RolePolicy")
            .set("name", &name)
            .set("role", resource.id())
            .set(
                "policy",
                policy_document([Property::map([
                    ("Action", Property::list(config.actions.iter())),
                    ("Effect", Property::from("Allow")),
                    ("Resource", Property::list(config.resources.iter())),
                ])]),
            ),
    )?;

    Ok(Role { resource, policy })
}
