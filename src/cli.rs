use clap::Parser;
use serde::Serialize;

/// Command-line overrides. Only flags that were actually given are merged
/// on top of the file and environment settings.
#[derive(Debug, Default, Parser, Serialize)]
#[command(name = "melon-chart-proxy", about = "Cached JSON proxy for the Melon realtime chart")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// How long a fetched chart is served from memory, in milliseconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_ms: Option<u64>,

    /// Maximum log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_level: Option<String>,
}
