//! Resource factories.
//!
//! Each factory declares one or more resources on a [`Program`](crate::program::Program)
//! from a logical name and a typed config, wires the dependency edges the
//! engine cannot infer, and returns a handle of deferred values for later
//! factories.

pub mod archive;
pub mod bucket;
pub mod cdn;
pub mod function;
pub mod gateway;
pub mod http_gateway;
pub mod registry;
pub mod role;
pub mod scheduler;

use crate::program::Property;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Normalizes a logical resource name: trimmed, lowercase, with `_`, `.`
/// and `/` replaced by `-`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '.' | '/') { '-' } else { c })
        .collect()
}

/// IAM policy document wrapping `statements`, JSON-encoded by the engine.
pub(crate) fn policy_document(statements: impl IntoIterator<Item = Property>) -> Property {
    Property::json(Property::map([
        ("Version", Property::from(POLICY_VERSION)),
        ("Statement", Property::list(statements)),
    ]))
}

/// Trust policy letting `service` assume a role.
pub(crate) fn assume_role_policy(service: &str) -> Property {
    policy_document([Property::map([
        ("Action", Property::from("sts:AssumeRole")),
        ("Effect", Property::from("Allow")),
        ("Sid", Property::from("")),
        ("Principal", Property::map([("Service", service)])),
    ])])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Media_Store.v2/api "), "media-store-v2-api");
        assert_eq!(normalize_name("plain"), "plain");
    }

    #[test]
    fn test_policy_document_shape() {
        let Property::Json(document) = policy_document([Property::from("x")]) else {
            panic!("expected json document");
        };
        let Property::Map(entries) = *document else {
            panic!("expected map");
        };
        assert_eq!(entries.get("Version"), Some(&Property::from(POLICY_VERSION)));
        assert!(matches!(entries.get("Statement"), Some(Property::List(s)) if s.len() == 1));
    }
}
