use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::normalize_name;

#[derive(Debug, Clone)]
pub struct ScheduleTarget {
    pub arn: Output,
    pub role_arn: Output,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// `cron(...)`, `rate(...)` or `at(...)` expression.
    pub expression: String,
    pub target: ScheduleTarget,
    /// Flexible time window mode.
    pub flexible_time_window: String,
    pub group_name: Option<String>,
    pub start_date: Option<String>,
}

impl ScheduleConfig {
    #[must_use]
    pub fn new(expression: impl Into<String>, target: ScheduleTarget) -> Self {
        Self {
            expression: expression.into(),
            target,
            flexible_time_window: "OFF".to_string(),
            group_name: None,
            start_date: None,
        }
    }
}

/// Declares an EventBridge Scheduler schedule invoking `config.target`.
///
/// # Errors
/// Returns an error if the schedule cannot be declared.
pub fn schedule(
    program: &mut Program,
    name: &str,
    config: &ScheduleConfig,
) -> Result<ResourceRef, ProgramError> {
    let name = normalize_name(name);

    program.declare(
        ResourceSpec::new(format!("{name}-schedule"), "aws:scheduler:Schedule")
            .set("name", &name)
            .set("groupName", config.group_name.as_ref())
            .set(
                "flexibleTimeWindow",
                Property::map([("mode", &config.flexible_time_window)]),
            )
            .set("scheduleExpression", &config.expression)
            .set("startDate", config.start_date.as_ref())
            .set(
                "target",
                Property::map([
                    ("arn", &config.target.arn),
                    ("roleArn", &config.target.role_arn),
                ]),
            ),
    )
}
