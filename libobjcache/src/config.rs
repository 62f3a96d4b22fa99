use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::storage::DEFAULT_PREFIX;
use crate::storage::driver::s3::S3Options;
use crate::storage::driver::{BackendConfig, StorageKind};
use crate::trace::{DaemonSink, LogSink, NullSink, Recorder, SegmentSink};

/// Storage options shared by the service and the function handler.
#[derive(clap::Args, Debug, Clone)]
pub struct StorageArgs {
    /// Storage backend type
    #[arg(long = "storage", env = "CACHE_STORAGE", value_enum, ignore_case = true)]
    pub storage: Option<StorageKind>,

    /// Bucket holding the cache entries
    #[arg(long, env = "CACHE_BUCKET", default_value = "objcache")]
    pub bucket: String,

    /// Key prefix inside the bucket
    #[arg(long, env = "CACHE_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Root directory of the filesystem backend
    #[arg(long, env = "CACHE_ROOTDIR", default_value = "/var/lib/objcache")]
    pub root: PathBuf,

    /// S3 region, falls back to the AWS provider chain
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom S3 endpoint, e.g. a local MinIO
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,
}

impl StorageArgs {
    /// Resolves the backend; `fallback` applies when no backend was chosen.
    pub fn backend_config(&self, fallback: StorageKind) -> BackendConfig {
        match self.storage.unwrap_or(fallback) {
            StorageKind::S3 => BackendConfig::S3(S3Options {
                region: self.region.clone(),
                endpoint: self.endpoint.clone(),
                force_path_style: self.force_path_style,
            }),
            StorageKind::Filesystem => BackendConfig::Filesystem {
                root: self.root.clone(),
            },
            StorageKind::Memory => BackendConfig::Memory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SinkKind {
    Log,
    Daemon,
    None,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TraceArgs {
    /// Where closed trace segments go
    #[arg(long = "trace-sink", env = "TRACE_SINK", value_enum, ignore_case = true, default_value = "log")]
    pub sink: SinkKind,

    /// Trace daemon UDP address
    #[arg(long, env = "AWS_XRAY_DAEMON_ADDRESS", default_value = DaemonSink::DEFAULT_ADDRESS)]
    pub daemon_address: String,
}

impl TraceArgs {
    pub fn recorder(&self) -> anyhow::Result<Recorder> {
        let sink: Arc<dyn SegmentSink> = match self.sink {
            SinkKind::Log => Arc::new(LogSink),
            SinkKind::None => Arc::new(NullSink),
            SinkKind::Daemon => {
                let address = resolve(&self.daemon_address)?;
                tracing::info!(%address, "sending trace segments to daemon");
                Arc::new(DaemonSink::new(address)?)
            }
        };
        Ok(Recorder::new(sink))
    }
}

fn resolve(address: &str) -> anyhow::Result<SocketAddr> {
    address
        .to_socket_addrs()
        .with_context(|| format!("invalid trace daemon address `{address}`"))?
        .next()
        .with_context(|| format!("trace daemon address `{address}` did not resolve"))
}
