use crate::program::Output;
use serde_yaml::{Mapping, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

/// A typed resource property.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Null,
    Bool(bool),
    Int(i64),
    Text(Output),
    List(Vec<Property>),
    Map(BTreeMap<String, Property>),
    /// Encoded to a JSON string by the engine once every reference resolves.
    Json(Box<Property>),
    FileAsset(PathBuf),
    FileArchive(PathBuf),
}

impl Property {
    /// Builds a map property from `(key, value)` pairs.
    #[must_use]
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Property>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn list<V: Into<Property>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn json(document: Property) -> Self {
        Self::Json(Box::new(document))
    }

    /// Resource and variable names referenced anywhere in this tree.
    #[must_use]
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references(&self, names: &mut BTreeSet<String>) {
        match self {
            Self::Text(output) => {
                names.extend(output.references().into_iter().map(str::to_string));
            }
            Self::List(values) => {
                for value in values {
                    value.collect_references(names);
                }
            }
            Self::Map(entries) => {
                for value in entries.values() {
                    value.collect_references(names);
                }
            }
            Self::Json(document) => document.collect_references(names),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::FileAsset(_)
            | Self::FileArchive(_) => {}
        }
    }

    /// Renders the property as a Pulumi YAML expression.
    #[must_use]
    pub fn to_yaml(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::Number((*value).into()),
            Self::Text(output) => Value::String(output.render()),
            Self::List(values) => Value::Sequence(values.iter().map(Self::to_yaml).collect()),
            Self::Map(entries) => {
                let mut mapping = Mapping::new();
                // unset optional fields are left to the provider default
                for (key, value) in entries.iter().filter(|(_, value)| **value != Self::Null) {
                    mapping.insert(Value::String(key.clone()), value.to_yaml());
                }
                Value::Mapping(mapping)
            }
            Self::Json(document) => function_call("fn::toJSON", document.to_yaml()),
            Self::FileAsset(path) => function_call(
                "fn::fileAsset",
                Value::String(path.to_string_lossy().into_owned()),
            ),
            Self::FileArchive(path) => function_call(
                "fn::fileArchive",
                Value::String(path.to_string_lossy().into_owned()),
            ),
        }
    }
}

pub(crate) fn function_call(name: &str, argument: Value) -> Value {
    let mut mapping = Mapping::new();
    mapping.insert(Value::String(name.to_string()), argument);
    Value::Mapping(mapping)
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Property {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::Text(Output::known(value))
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::Text(Output::known(value))
    }
}

impl From<&String> for Property {
    fn from(value: &String) -> Self {
        Self::Text(Output::known(value.as_str()))
    }
}

impl From<Output> for Property {
    fn from(value: Output) -> Self {
        Self::Text(value)
    }
}

impl From<&Output> for Property {
    fn from(value: &Output) -> Self {
        Self::Text(value.clone())
    }
}

impl<V: Into<Property>> From<Vec<V>> for Property {
    fn from(values: Vec<V>) -> Self {
        Self::list(values)
    }
}

impl<V: Into<Property>> From<Option<V>> for Property {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<V: Into<Property>> From<BTreeMap<String, V>> for Property {
    fn from(entries: BTreeMap<String, V>) -> Self {
        Self::map(entries)
    }
}
