//! `plugin-image version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("plugin-image version {}", plugin_image_fetch::VERSION);
    println!("user agent: {}", plugin_image_core::USER_AGENT);
    Ok(())
}
