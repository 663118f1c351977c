//! CLI command implementations
//!
//! Protocol commands (`check`, `in`, `out`) read one JSON request from stdin
//! and write one JSON response to stdout. Each keeps its logic in a function
//! over the provider traits so it can run against fakes.

pub mod check;
pub mod download;
pub mod get;
pub mod put;

pub use check::execute as check;
pub use download::execute as download;
pub use get::execute as get;
pub use put::execute as put;

use crate::error::{ResourceError, ResourceResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Decode a request envelope
pub fn read_request<T: DeserializeOwned>(reader: impl Read) -> ResourceResult<T> {
    serde_json::from_reader(reader).map_err(|e| ResourceError::from(e).during("reading request"))
}

/// Encode a response envelope followed by a newline
pub fn write_response<T: Serialize>(mut writer: impl Write, response: &T) -> ResourceResult<()> {
    serde_json::to_writer(&mut writer, response)
        .map_err(|e| ResourceError::from(e).during("writing response"))?;
    writeln!(writer)
        .and_then(|_| writer.flush())
        .map_err(|e| ResourceError::io("writing response", e))
}
