use std::net::SocketAddr;

use anyhow::Result;
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use metadata_store::MetadataStoreConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    #[serde(default)]
    pub structured_logging: bool,
    pub metadata_store: MetadataStoreConfig,
    pub blob_storage: BlobStorageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8900".to_string(),
            structured_logging: false,
            metadata_store: Default::default(),
            blob_storage: Default::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, overlaid with the YAML file (when given), overlaid with
    /// FEDERATION_-prefixed environment variables
    /// (e.g. FEDERATION_METADATA_STORE__URI).
    pub fn load(path: Option<&str>) -> Result<ServerConfig> {
        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));
        if let Some(path) = path {
            let config_str = std::fs::read_to_string(path)?;
            figment = figment.merge(Yaml::string(&config_str));
        }
        let config: ServerConfig = figment
            .merge(Env::prefixed("FEDERATION_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.blob_storage.s3.is_some() && self.blob_storage.disk.is_some() {
            return Err(anyhow::anyhow!(
                "cannot specify both s3 and disk blob storage"
            ));
        }
        if self.blob_storage.s3.is_none() && self.blob_storage.disk.is_none() {
            return Err(anyhow::anyhow!(
                "must specify one of s3 or disk blob storage"
            ));
        }
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        Ok(())
    }
}
