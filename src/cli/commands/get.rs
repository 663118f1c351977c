//! In command - download the artifacts for a version

use crate::cli::args::InArgs;
use crate::cli::commands::{read_request, write_response};
use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::{DriverContext, FileDriver, FileProvider};
use crate::resolver::{ConfigDriver, ConfigProvider};
use crate::types::{InRequest, MetadataField, VersionResponse, STEMCELL_PRODUCT};
use std::path::Path;
use tracing::info;

/// Execute the in command
pub async fn execute(args: InArgs, ctx: &DriverContext) -> ResourceResult<()> {
    tokio::fs::create_dir_all(&args.destination)
        .await
        .map_err(|e| {
            ResourceError::io(format!("creating {}", args.destination.display()), e)
                .during("creating destination")
        })?;

    let request: InRequest = read_request(std::io::stdin().lock())?;

    let resolver = ConfigDriver::from_source(&request.source, &ctx.settings.git)
        .map_err(|e| e.during("constructing config provider"))?;
    let fetcher = FileDriver::from_source(&request.source, ctx)
        .await
        .map_err(|e| e.during("constructing file provider"))?;

    let response = fetch(&resolver, &fetcher, &args.destination, &request).await?;
    write_response(std::io::stdout().lock(), &response)
}

/// Resolve the version info, download the product or its stemcell, and
/// describe what was fetched
pub async fn fetch(
    resolver: &dyn ConfigProvider,
    fetcher: &dyn FileProvider,
    destination: &Path,
    request: &InRequest,
) -> ResourceResult<VersionResponse> {
    let info = resolver
        .version_info(&request.version.reference, &request.params.product)
        .await
        .map_err(|e| e.during("getting version info"))?;

    let (product, version, pattern, doing) = if request.params.stemcell {
        (
            STEMCELL_PRODUCT,
            info.stemcell_version.as_str(),
            info.stemcell_file_pattern.as_str(),
            "downloading stemcell file",
        )
    } else {
        (
            info.product_slug.as_str(),
            info.version.as_str(),
            info.file_pattern.as_str(),
            "downloading file",
        )
    };

    info!(
        "Fetching {} {} via {}",
        product,
        version,
        fetcher.provider_name()
    );
    let files = fetcher
        .download_file(destination, product, version, pattern)
        .await
        .map_err(|e| e.during(doing))?;
    info!("Fetched {} file(s) into {}", files.len(), destination.display());

    Ok(VersionResponse {
        version: request.version.clone(),
        metadata: vec![
            MetadataField::new("resource_version", env!("CARGO_PKG_VERSION")),
            MetadataField::new("ref", &request.version.reference),
            MetadataField::new("product", product),
            MetadataField::new("product_version", version),
            MetadataField::new("file_pattern", pattern),
        ],
    })
}
