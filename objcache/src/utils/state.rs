use std::sync::Arc;

use libobjcache::trace::Recorder;
use libobjcache::{Dispatcher, KeyLayout, ObjectBackend, StorageGateway};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub recorder: Recorder,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the storage backend and trace recorder described by `config`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let backend = config.backend.build().await;
        let recorder = config.trace.recorder()?;
        Ok(Self::from_parts(config, backend, recorder))
    }

    pub fn from_parts(config: Config, backend: Arc<dyn ObjectBackend>, recorder: Recorder) -> Self {
        let gateway = StorageGateway::new(
            backend,
            config.bucket.clone(),
            KeyLayout::new(config.prefix.clone()),
        );
        let transform = Arc::from(config.transform.build());
        AppState {
            dispatcher: Dispatcher::new(gateway, transform),
            recorder,
            config: Arc::new(config),
        }
    }
}
