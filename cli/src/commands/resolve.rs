//! `plugin-image resolve` command.

use clap::Args;
use plugin_image_fetch::oci::Identifier;
use plugin_image_fetch::ImageReference;

#[derive(Args)]
pub struct ResolveArgs {
    /// Image reference (e.g., "kong/my-plugin:1.0", "ghcr.io/org/plugin@sha256:...")
    pub image: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let reference = ImageReference::parse(&args.image)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&describe(&reference))?);
    } else {
        println!("Registry:   {}", reference.registry);
        println!("Repository: {}", reference.repository);
        match &reference.identifier {
            Identifier::Tag(tag) => println!("Tag:        {tag}"),
            Identifier::Digest(digest) => println!("Digest:     {digest}"),
        }
        println!("Reference:  {}", reference.full_reference());
    }

    Ok(())
}

fn describe(reference: &ImageReference) -> serde_json::Value {
    serde_json::json!({
        "registry": reference.registry,
        "repository": reference.repository,
        "tag": reference.tag(),
        "digest": reference.digest(),
        "reference": reference.full_reference(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_defaults() {
        let reference = ImageReference::parse("my-plugin").unwrap();
        let value = describe(&reference);

        assert_eq!(value["registry"], "docker.io");
        assert_eq!(value["repository"], "library/my-plugin");
        assert_eq!(value["tag"], "latest");
        assert!(value["digest"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_reference_fails() {
        let args = ResolveArgs {
            image: "foo bar".to_string(),
            json: false,
        };
        let err = execute(args).await.unwrap_err();
        assert!(err.to_string().starts_with("invalid image reference 'foo bar'"));
    }
}
