pub mod local;
pub mod pinata;
pub mod provider;

pub use local::*;
pub use pinata::*;
pub use provider::*;

use std::sync::Arc;

use crate::config::{BlobBackend, BlobStoreConfig};

/// Build the blob store selected in configuration
pub async fn build_blob_store(config: &BlobStoreConfig) -> Arc<dyn BlobStore> {
    match config.backend {
        BlobBackend::Local => {
            tracing::info!("Using local blob store at {}", config.local_path);
            Arc::new(LocalBlobStore::new(&config.local_path))
        }
        BlobBackend::Pinata => {
            let store = PinataStore::new(config);
            // A failing check is not fatal: the gateway may come back before the first upload
            match store.verify_credentials().await {
                Ok(()) => tracing::info!("Pinata credentials verified"),
                Err(e) => tracing::warn!("Pinata credential check failed: {}", e),
            }
            Arc::new(store)
        }
    }
}
