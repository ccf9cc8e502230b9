use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use shardgate::config::{has_flag, GateConfig};
use shardgate::fixtures::FixtureRegistry;
use shardgate::server::{http, GateService, ReferenceServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("shardgate\n\nUSAGE:\n  shardgate [--http-port N] [--address HOST:PORT]\n\nOPTIONS:\n  --http-port N          Port for the HTTP/WebSocket binding (env: SHARDGATE_HTTP_PORT, default {})\n  --address HOST:PORT    Full listen address, overrides --http-port (env: SHARDGATE_ADDRESS)\n", shardgate::config::DEFAULT_HTTP_PORT);
        return Ok(());
    }
    let cfg = GateConfig::load();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "shardgate", "shardgate starting: RUST_LOG='{}', listen={}", rust_log, cfg.listen_address());

    let service: Arc<dyn GateService> = Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())));
    let listener = tokio::net::TcpListener::bind(cfg.listen_address()).await?;
    http::serve(listener, service).await
}
