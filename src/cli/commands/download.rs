//! Download command - fetch a product and its stemcell through the cache

use crate::cli::args::DownloadArgs;
use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::cache::ContentCache;
use crate::fetcher::pivnet::PivnetProvider;
use crate::fetcher::{DriverContext, FileProvider};
use crate::types::{VersionInfo, STEMCELL_PRODUCT};
use console::style;
use std::path::{Path, PathBuf};

/// Execute the download command
pub async fn execute(args: DownloadArgs, ctx: &DriverContext) -> ResourceResult<()> {
    let info = read_product_config(&args.config_file)
        .await
        .map_err(|e| e.during("reading product config"))?;

    let provider = cached_provider(&args, ctx).await?;
    let files = download_product(&provider, &info, &args.download_dir, &args.stemcell_dir).await?;

    for file in &files {
        eprintln!("{} {}", style("✓").green(), file.display());
    }
    Ok(())
}

/// Pivnet provider backed by the cache directory from `args`
async fn cached_provider(args: &DownloadArgs, ctx: &DriverContext) -> ResourceResult<PivnetProvider> {
    let cache = ContentCache::open(&args.cache_dir)
        .await
        .map_err(|e| e.during("opening cache"))?;
    let provider = PivnetProvider::new(&args.host, &args.token, ctx)
        .map_err(|e| e.during("constructing file provider"))?;
    Ok(provider.with_cache(cache))
}

/// Parse a product config file
pub async fn read_product_config(path: &Path) -> ResourceResult<VersionInfo> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ResourceError::io(format!("reading {}", path.display()), e))?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Download the product, then its stemcell when one is pinned
pub async fn download_product(
    fetcher: &dyn FileProvider,
    info: &VersionInfo,
    download_dir: &Path,
    stemcell_dir: &Path,
) -> ResourceResult<Vec<PathBuf>> {
    let mut files = fetcher
        .download_file(download_dir, &info.product_slug, &info.version, &info.file_pattern)
        .await
        .map_err(|e| e.during("downloading file"))?;

    if info.has_stemcell() {
        let stemcells = fetcher
            .download_file(
                stemcell_dir,
                STEMCELL_PRODUCT,
                &info.stemcell_version,
                &info.stemcell_file_pattern,
            )
            .await
            .map_err(|e| e.during("downloading stemcell file"))?;
        files.extend(stemcells);
    }

    Ok(files)
}
