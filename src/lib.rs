//! Artifact resource
//!
//! A CI resource that tracks product versions recorded as YAML files in a
//! git repository and downloads the matching artifacts from a licensed
//! download API, an S3-compatible object store or a plain HTTP server.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod resolver;
pub mod types;
pub mod ui;

pub use error::{ResourceError, ResourceResult};
