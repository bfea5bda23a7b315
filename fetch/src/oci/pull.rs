//! High-level plugin fetch orchestrator.
//!
//! Runs the whole pipeline for one image URL: parse the reference, build a
//! registry client, copy the manifest graph into memory, pick the plugin
//! layer, extract it and classify its files. Nothing touches the disk and no
//! state survives between calls.
//!
//! Cancellation is cooperative: dropping the future returned by
//! [`PluginFetcher::fetch`] aborts any in-flight request and releases the
//! in-memory store.

use std::sync::Arc;

use plugin_image_core::{FetchConfig, PluginFiles, Result};

use super::classify::classify;
use super::copy::copy_graph;
use super::credentials::CredentialStore;
use super::layers::{select_layer, LayerExtractor};
use super::reference::ImageReference;
use super::registry::{OciConnector, RegistryConnector};

/// Fetches Kong plugin images from OCI registries.
pub struct PluginFetcher {
    config: FetchConfig,
    connector: Arc<dyn RegistryConnector>,
}

impl PluginFetcher {
    /// Create a fetcher talking to real registries.
    pub fn new(config: FetchConfig) -> Self {
        let connector = Arc::new(OciConnector::new(config.clone()));
        Self { config, connector }
    }

    /// Create a fetcher with a custom connector.
    pub fn with_connector(config: FetchConfig, connector: Arc<dyn RegistryConnector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch the plugin behind `image_url`.
    ///
    /// Credentials, when given, are looked up for the reference's registry;
    /// otherwise the pull is anonymous.
    pub async fn fetch(
        &self,
        image_url: &str,
        credentials: Option<&dyn CredentialStore>,
    ) -> Result<PluginFiles> {
        tracing::info!(image = %image_url, "Fetching plugin image");
        let result = self.run(image_url, credentials).await;

        match &result {
            Ok(plugin) => tracing::info!(
                image = %image_url,
                files = plugin.len(),
                "Fetched plugin image"
            ),
            Err(e) => tracing::warn!(
                image = %image_url,
                kind = e.kind(),
                error = %e,
                "Plugin image rejected"
            ),
        }

        result
    }

    async fn run(
        &self,
        image_url: &str,
        credentials: Option<&dyn CredentialStore>,
    ) -> Result<PluginFiles> {
        let reference = ImageReference::parse(image_url)?;
        tracing::debug!(reference = %reference.full_reference(), "Resolved image reference");

        let registry = self.connector.connect(&reference.registry, credentials)?;

        let graph = copy_graph(registry.as_ref(), &reference, image_url, &self.config).await?;
        let layer = select_layer(graph.layers)?;
        tracing::debug!(
            digest = %layer.descriptor.digest,
            media_type = %layer.descriptor.media_type,
            size = layer.descriptor.size,
            "Selected plugin layer"
        );

        let files = LayerExtractor::new(self.config.size_limit).extract(&graph.store, &layer)?;
        classify(files)
    }
}

/// Fetch a plugin image with the default configuration.
pub async fn fetch(
    image_url: &str,
    credentials: Option<&dyn CredentialStore>,
) -> Result<PluginFiles> {
    PluginFetcher::new(FetchConfig::default())
        .fetch(image_url, credentials)
        .await
}
