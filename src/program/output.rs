//! Deferred values.
//!
//! An [`Output`] is a value the engine only knows once the resources it
//! references exist. It is kept as a template of literal text and
//! `(resource, property)` references, so derivations compose before the
//! value is resolved and the whole template renders to a single
//! `${resource.property}` interpolation string.

use std::{collections::BTreeSet, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Reference {
        name: String,
        property: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    parts: Vec<Part>,
}

impl Output {
    /// A value that is already known.
    #[must_use]
    pub fn known(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            return Self::default();
        }
        Self {
            parts: vec![Part::Literal(value)],
        }
    }

    /// The `property` of resource `name`, resolved by the engine.
    #[must_use]
    pub fn reference(name: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Reference {
                name: name.into(),
                property: Some(property.into()),
            }],
        }
    }

    /// The value of a program variable (an invoke result).
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Reference {
                name: name.into(),
                property: None,
            }],
        }
    }

    /// Joins outputs in order.
    #[must_use]
    pub fn concat(outputs: impl IntoIterator<Item = Output>) -> Self {
        let mut joined = Self::default();
        for output in outputs {
            for part in output.parts {
                joined.push(part);
            }
        }
        joined
    }

    /// Substitutes `args` for each `{}` of `template`, left to right.
    ///
    /// Surplus placeholders render empty, surplus arguments are dropped.
    #[must_use]
    pub fn format(template: &str, args: impl IntoIterator<Item = Output>) -> Self {
        let mut args = args.into_iter();
        let mut pieces = template.split("{}");
        let mut formatted = Self::default();

        if let Some(head) = pieces.next() {
            formatted.push(Part::Literal(head.to_string()));
        }
        for piece in pieces {
            if let Some(arg) = args.next() {
                for part in arg.parts {
                    formatted.push(part);
                }
            }
            formatted.push(Part::Literal(piece.to_string()));
        }
        formatted
    }

    /// Derives a new deferred value by placing `self` into `template`.
    ///
    /// `arn.apply("{}/*")` is the object-level ARN of a bucket.
    #[must_use]
    pub fn apply(self, template: &str) -> Self {
        Self::format(template, [self])
    }

    /// Returns the resolved value when no part depends on the engine.
    #[must_use]
    pub fn as_known(&self) -> Option<String> {
        let mut value = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => value.push_str(text),
                Part::Reference { .. } => return None,
            }
        }
        Some(value)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Names of the resources and variables this value depends on.
    #[must_use]
    pub fn references(&self) -> BTreeSet<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Reference { name, .. } => Some(name.as_str()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    /// Renders the engine interpolation string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => rendered.push_str(&text.replace("${", "$${")),
                Part::Reference {
                    name,
                    property: Some(property),
                } => {
                    rendered.push_str("${");
                    rendered.push_str(name);
                    rendered.push('.');
                    rendered.push_str(property);
                    rendered.push('}');
                }
                Part::Reference {
                    name,
                    property: None,
                } => {
                    rendered.push_str("${");
                    rendered.push_str(name);
                    rendered.push('}');
                }
            }
        }
        rendered
    }

    // Adjacent literals are merged so equal values compare equal however
    // they were composed.
    fn push(&mut self, part: Part) {
        match (self.parts.last_mut(), part) {
            (_, Part::Literal(text)) if text.is_empty() => {}
            (Some(Part::Literal(last)), Part::Literal(text)) => last.push_str(&text),
            (_, part) => self.parts.push(part),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Output {
    fn from(value: &str) -> Self {
        Self::known(value)
    }
}

impl From<String> for Output {
    fn from(value: String) -> Self {
        Self::known(value)
    }
}

impl From<&String> for Output {
    fn from(value: &String) -> Self {
        Self::known(value.as_str())
    }
}

impl From<&Output> for Output {
    fn from(value: &Output) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_renders_literal() {
        let output = Output::known("private");
        assert_eq!(output.render(), "private");
        assert_eq!(output.as_known(), Some("private".to_string()));
        assert!(output.references().is_empty());
    }

    #[test]
    fn test_reference_renders_interpolation() {
        let output = Output::reference("media-bucket", "arn");
        assert_eq!(output.render(), "${media-bucket.arn}");
        assert_eq!(output.as_known(), None);
        assert!(output.references().contains("media-bucket"));
    }

    #[test]
    fn test_variable_renders_without_property() {
        assert_eq!(Output::variable("accountId").render(), "${accountId}");
    }

    #[test]
    fn test_apply_wraps_reference() {
        let objects = Output::reference("media-bucket", "arn").apply("{}/*");
        assert_eq!(objects.render(), "${media-bucket.arn}/*");
    }

    #[test]
    fn test_format_multiple_arguments() {
        let endpoint = Output::format(
            "https://{}.execute-api.{}.amazonaws.com/{}",
            [
                Output::reference("api", "id"),
                Output::known("eu-west-1"),
                Output::reference("stage", "stageName"),
            ],
        );
        assert_eq!(
            endpoint.render(),
            "https://${api.id}.execute-api.eu-west-1.amazonaws.com/${stage.stageName}"
        );
        let references = endpoint.references();
        assert_eq!(references.len(), 2);
    }

    #[test]
    fn test_format_known_arguments_stay_known() {
        let output = Output::format("{}:{}", [Output::known("a"), Output::known("b")]);
        assert_eq!(output.as_known(), Some("a:b".to_string()));
        assert_eq!(output, Output::known("a:b"));
    }

    #[test]
    fn test_concat_merges_literals() {
        let output = Output::concat([
            Output::reference("api", "executionArn"),
            Output::known("/"),
            Output::known("*"),
        ]);
        assert_eq!(output, Output::reference("api", "executionArn").apply("{}/*"));
    }

    #[test]
    fn test_literal_interpolation_is_escaped() {
        let output = Output::known("${not-a-reference}");
        assert_eq!(output.render(), "$${not-a-reference}");
        assert_eq!(Output::known("$default").render(), "$default");
    }

    #[test]
    fn test_empty_known_is_empty() {
        assert!(Output::known("").is_empty());
        assert_eq!(Output::known("").as_known(), Some(String::new()));
    }
}
