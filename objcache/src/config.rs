use std::path::Path;

use libobjcache::config::TraceArgs;
use libobjcache::storage::driver::{BackendConfig, StorageKind};
use libobjcache::transform::TransformKind;

use crate::utils::cli::Args;

pub const DEV_HOST: &str = "127.0.0.1";
pub const DEV_PORT: u16 = 5000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Neither `HOST` nor `PORT` given: loopback, in-memory storage unless
    /// another backend is requested, verbose logging.
    Development,
    Standalone,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub bucket: String,
    pub prefix: String,
    pub backend: BackendConfig,
    pub transform: TransformKind,
    pub trace: TraceArgs,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        let mode = match (&args.host, args.port) {
            (None, None) => Mode::Development,
            _ => Mode::Standalone,
        };
        let (host, port, fallback) = match mode {
            Mode::Development => (DEV_HOST.to_string(), DEV_PORT, StorageKind::Memory),
            Mode::Standalone => (
                args.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
                args.port.unwrap_or(DEFAULT_PORT),
                StorageKind::S3,
            ),
        };

        Config {
            mode,
            host,
            port,
            service_name: args.service_name.clone(),
            bucket: args.storage.bucket.clone(),
            prefix: args.storage.prefix.clone(),
            backend: args.storage.backend_config(fallback),
            transform: args.transform,
            trace: args.trace.clone(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_log_level(&self) -> &'static str {
        match self.mode {
            Mode::Development => "debug",
            Mode::Standalone => "info",
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut validation_errors = Vec::new();

        if self.bucket.is_empty() {
            validation_errors.push("CACHE_BUCKET must not be empty".to_string());
        }

        if let BackendConfig::Filesystem { root } = &self.backend {
            let root_dir = Path::new(root);
            match std::fs::metadata(root_dir) {
                Ok(meta) if !meta.is_dir() => validation_errors.push(format!(
                    "CACHE_ROOTDIR `{}` exists but is not a directory",
                    root_dir.display(),
                )),
                Ok(_) => {}
                Err(_) => validation_errors.push(format!(
                    "CACHE_ROOTDIR `{}` does not exist",
                    root_dir.display(),
                )),
            }
        }

        if validation_errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(validation_errors.join("\n"))
        }
    }
}
