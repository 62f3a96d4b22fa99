use clap::Parser;
use libobjcache::config::{StorageArgs, TraceArgs};
use libobjcache::transform::TransformKind;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listening host. Leave both host and port unset for development mode
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Listening port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Name of the request-level trace segment
    #[arg(long, env = "CACHE_SERVICE_NAME", default_value = "objcache")]
    pub service_name: String,

    /// Payload transform applied before storing
    #[arg(long, env = "CACHE_TRANSFORM", value_enum, ignore_case = true, default_value = "rot13")]
    pub transform: TransformKind,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub trace: TraceArgs,
}
