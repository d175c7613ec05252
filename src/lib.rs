//! # stackwright
//!
//! Provisions a fixed AWS topology (bucket, container registry, functions
//! behind a REST API, a schedule and a CDN) through Pulumi. The topology is
//! declared as a typed resource graph, rendered into a Pulumi YAML project
//! and driven through the `pulumi` CLI, one lifecycle operation per run.

pub mod cli;
pub mod program;
pub mod resources;
pub mod stack;
pub mod topology;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
