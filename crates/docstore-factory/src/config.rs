use docstore_client::ClientConfig;
use serde::{Deserialize, Serialize};

/// Configuration of a [`StorageFactory`](crate::StorageFactory).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Give each tenant its own namespace. When `false`, every storage uses
    /// the datastore's fixed namespace (or the default one).
    pub multitenant: bool,
    /// Settings of the client wrapper the factory creates.
    pub client: ClientConfig,
}

impl FactoryConfig {
    pub fn multitenant() -> Self {
        Self {
            multitenant: true,
            ..Default::default()
        }
    }
}
