//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Artifact resource
///
/// Tracks product versions recorded in a git repository and downloads the
/// matching artifacts. Protocol commands read a JSON request on stdin and
/// write a JSON response on stdout.
#[derive(Parser, Debug)]
#[command(name = "artifact-resource")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Settings file path
    #[arg(short, long, global = true, env = "ARTIFACT_RESOURCE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the latest version of the tracked repository
    Check,

    /// Download the artifacts for a version into a directory
    #[command(name = "in")]
    In(InArgs),

    /// Echo the requested version back
    Out(OutArgs),

    /// Download a product and its stemcell through the cache, outside CI
    Download(DownloadArgs),
}

/// Arguments for the in command
#[derive(Parser, Debug)]
pub struct InArgs {
    /// Directory to place downloaded files in
    pub destination: PathBuf,
}

/// Arguments for the out command
#[derive(Parser, Debug)]
pub struct OutArgs {
    /// Directory holding the build's inputs
    pub source: PathBuf,
}

/// Arguments for the download command
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// API token for the licensed-download API
    #[arg(long, env = "PIVNET_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Directory to download product files to
    #[arg(long, env = "PIVNET_DOWNLOAD_DIR")]
    pub download_dir: PathBuf,

    /// Directory to download the stemcell to
    #[arg(long, env = "PIVNET_STEMCELL_DIR", default_value = "stemcells")]
    pub stemcell_dir: PathBuf,

    /// Directory for the file cache
    #[arg(long, default_value = ".pivotal-cache")]
    pub cache_dir: PathBuf,

    /// YAML file naming the product, version and file patterns to download
    #[arg(long)]
    pub config_file: PathBuf,

    /// API host
    #[arg(long, env = "PIVNET_HOST", default_value = "")]
    pub host: String,
}

/// Entry points the binary answers to when invoked through a link
const PROTOCOL_COMMANDS: [&str; 3] = ["check", "in", "out"];

/// Insert the subcommand implied by the executable name.
///
/// CI systems run `/opt/resource/check`, `/opt/resource/in <dir>` and
/// `/opt/resource/out <dir>`; each is a link to this binary.
pub fn normalize_args(mut args: Vec<OsString>) -> Vec<OsString> {
    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string);

    if let Some(name) = invoked_as {
        if PROTOCOL_COMMANDS.contains(&name.as_str()) {
            args.insert(1, OsString::from(name));
        }
    }
    args
}
