//! Client configuration
//!
//! Values come from, lowest precedence first: built-in defaults, an optional
//! TOML/JSON file, then `FULA_`-prefixed environment variables (a `.env` file
//! is loaded into the environment first).

use crate::Result;
use fula_core::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Credential for the shared public namespace
    pub public_token: String,
    /// Seconds to wait for the metadata store's initial snapshots
    pub ready_timeout_secs: u64,
    /// Maximum concurrent uploads within one level
    pub upload_concurrency: usize,
    /// Inbox messages fetched per page
    pub mailbox_page_size: usize,
    /// Where the session is persisted
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            public_token: String::new(),
            ready_timeout_secs: 10,
            upload_concurrency: 16,
            mailbox_page_size: 50,
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Create a config with the given public token
    pub fn new(public_token: impl Into<String>) -> Self {
        Self {
            public_token: public_token.into(),
            ..Default::default()
        }
    }

    /// Load from `.env` and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(None)
    }

    /// Load from an optional file, then the environment
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("FULA").try_parsing(true))
            .build()?
            .try_deserialize::<ClientConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.upload_concurrency == 0 {
            return Err(crate::ClientError::Config(
                "upload_concurrency must be at least 1".to_string(),
            ));
        }
        if self.mailbox_page_size == 0 {
            return Err(crate::ClientError::Config(
                "mailbox_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the readiness timeout
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the per-level upload concurrency
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency;
        self
    }

    /// Set the session file
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Readiness timeout as a duration
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Metadata store settings derived from this config
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.public_token.clone()).with_ready_timeout(self.ready_timeout())
    }
}
