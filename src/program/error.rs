use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("resource name must not be empty")]
    EmptyName,
    #[error("duplicate resource name: {0}")]
    DuplicateName(String),
    #[error("{resource} references undeclared resource or variable: {reference}")]
    UnknownReference { resource: String, reference: String },
    #[error("{resource} depends on undeclared resource: {dependency}")]
    UnknownDependency {
        resource: String,
        dependency: String,
    },
    #[error("malformed endpoint #{index}: {reason}")]
    MalformedEndpoint { index: usize, reason: String },
    #[error("endpoint #{index} references unknown handler: {handler}")]
    UnknownHandler { index: usize, handler: String },
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("invalid yaml")]
    Yaml(#[from] serde_yaml::Error),
}
