//! Out command - echo the version back

use crate::cli::args::OutArgs;
use crate::cli::commands::{read_request, write_response};
use crate::error::ResourceResult;
use crate::types::{OutRequest, VersionResponse};
use tracing::debug;

/// Execute the out command
pub async fn execute(args: OutArgs) -> ResourceResult<()> {
    debug!("Ignoring out source directory {}", args.source.display());
    let request: OutRequest = read_request(std::io::stdin().lock())?;
    write_response(std::io::stdout().lock(), &put(request))
}

/// The requested version with no metadata
pub fn put(request: OutRequest) -> VersionResponse {
    VersionResponse {
        version: request.version,
        metadata: Vec::new(),
    }
}
