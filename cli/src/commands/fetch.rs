//! `plugin-image fetch` command.

use std::path::{Path, PathBuf};

use clap::Args;
use plugin_image_core::{FetchConfig, PluginFiles, RegistryProtocol};
use plugin_image_fetch::{CredentialFile, CredentialStore, EnvCredentials, PluginFetcher};

#[derive(Args)]
pub struct FetchArgs {
    /// Image reference (e.g., "ghcr.io/kong/my-plugin:1.0.0")
    pub image: String,

    /// Write handler.lua and schema.lua into this directory instead of printing JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Registry credentials file ({"registries": {"<host>": {"username", "password"}}})
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Fetch configuration file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum size of each extracted file, in bytes
    #[arg(long)]
    pub size_limit: Option<u64>,

    /// Reach every registry over plain HTTP
    #[arg(long)]
    pub plain_http: bool,

    /// Reach this registry over plain HTTP (repeatable)
    #[arg(long = "insecure-registry", value_name = "HOST")]
    pub insecure_registries: Vec<String>,

    /// Give up on the registry after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

pub async fn execute(args: FetchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    let credentials = load_credentials(args.credentials.as_deref())?;
    tracing::debug!(
        size_limit = config.size_limit,
        plain_http = config.protocol == RegistryProtocol::Http,
        insecure_registries = ?config.insecure_registries,
        timeout_secs = ?config.timeout_secs,
        authenticated = credentials.is_some(),
        "Resolved fetch settings"
    );

    let fetcher = PluginFetcher::new(config);
    let plugin = fetcher.fetch(&args.image, credentials.as_deref()).await?;

    match &args.output {
        Some(dir) => {
            write_plugin(&plugin, dir)?;
            println!("Fetched {} into {}", args.image, dir.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&plugin.to_string_map())?),
    }

    Ok(())
}

/// Layer command-line flags over the optional config file.
fn build_config(args: &FetchArgs) -> Result<FetchConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => FetchConfig::from_yaml_file(path)?,
        None => FetchConfig::default(),
    };

    if let Some(limit) = args.size_limit {
        config.size_limit = limit;
    }
    if args.plain_http {
        config.protocol = RegistryProtocol::Http;
    }
    config
        .insecure_registries
        .extend(args.insecure_registries.iter().cloned());
    if let Some(secs) = args.timeout {
        config.timeout_secs = Some(secs);
    }

    config.validate()?;
    Ok(config)
}

/// Credentials from `--credentials`, else from the environment, else none.
fn load_credentials(
    path: Option<&Path>,
) -> Result<Option<Box<dyn CredentialStore>>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let file: Box<dyn CredentialStore> = Box::new(CredentialFile::load(path)?);
        return Ok(Some(file));
    }

    let env = EnvCredentials::from_env();
    if !env.is_set() {
        return Ok(None);
    }
    let env: Box<dyn CredentialStore> = Box::new(env);
    Ok(Some(env))
}

fn write_plugin(plugin: &PluginFiles, dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for (name, contents) in plugin.iter() {
        std::fs::write(dir.join(name), contents)?;
    }
    Ok(())
}
