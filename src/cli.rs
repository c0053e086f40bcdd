use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sensor-server-rs",
    version,
    about = "Industrial sensor telemetry and reliability analytics server"
)]
pub struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// Directory holding the record store; overrides SENSOR_DATA_ROOT.
    #[arg(long)]
    pub data_root: Option<PathBuf>,
    /// Directory with the built dashboard assets to serve as fallback.
    #[arg(long)]
    pub static_root: Option<PathBuf>,
    /// Print the OpenAPI document and exit.
    #[arg(long, default_value_t = false)]
    pub print_openapi: bool,
}
