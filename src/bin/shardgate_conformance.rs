//!
//! shardgate_conformance
//! ---------------------
//! Starts the reference server in-process and runs the conformance suite against it, first over
//! the in-process binding and then over the binding named by `--protocol`. For any protocol other
//! than `mem` the reference server is served over HTTP/WebSocket on `--address` (an ephemeral
//! loopback port when unset) and the binding dials that address. Prints one report per binding
//! and exits non-zero if any scenario failed.
//!
//! Example:
//!   cargo run --bin shardgate_conformance -- --protocol http --address 127.0.0.1:15991
//!

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use shardgate::config::{has_flag, GateConfig};
use shardgate::conformance::{run_registered, SuiteReport};
use shardgate::conn::{self, mem};
use shardgate::fixtures::FixtureRegistry;
use shardgate::server::{http, GateService, ReferenceServer};

const MEM_PROTOCOL: &str = "mem";

fn print_usage() {
    println!(
        "shardgate_conformance\n\nUSAGE:\n  shardgate_conformance [--protocol NAME] [--address HOST:PORT] [--timeout-ms N] [--mem-only]\n\nOPTIONS:\n  --protocol NAME        Dialer to test after the in-process run (env: SHARDGATE_PROTOCOL, default http)\n  --address HOST:PORT    Where the reference server listens and the dialer connects (env: SHARDGATE_ADDRESS, default ephemeral loopback port)\n  --timeout-ms N         Dial timeout in milliseconds (env: SHARDGATE_DIAL_TIMEOUT_MS, default 5000)\n  --mem-only             Only run the in-process binding\n\nSHARDGATE_SCENARIO_TIMEOUT_MS bounds each scenario (default 10000).\n"
    );
}

fn print_report(binding: &str, report: &SuiteReport) {
    println!("== {} binding ==", binding);
    println!("{}", report);
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage();
        return Ok(());
    }
    let cfg = GateConfig::load();
    let fixtures = Arc::new(FixtureRegistry::canonical());
    let mut failed = false;

    let server = Arc::new(ReferenceServer::new(fixtures.clone()));
    let service: Arc<dyn GateService> = server.clone();
    conn::register_dialer(MEM_PROTOCOL, mem::dialer(service));
    let report = run_registered(MEM_PROTOCOL, server, "", cfg.dial_timeout, cfg.scenario_timeout).await?;
    print_report(MEM_PROTOCOL, &report);
    failed |= !report.passed();

    if !has_flag(&args, "--mem-only") && cfg.protocol != MEM_PROTOCOL {
        let server = Arc::new(ReferenceServer::new(fixtures));
        let service: Arc<dyn GateService> = server.clone();
        let listen = cfg.address.as_deref().unwrap_or("127.0.0.1:0");
        let (addr, handle) = http::spawn_at(listen, service).await?;
        info!("reference server for {} binding on {}", cfg.protocol, addr);
        let res = run_registered(&cfg.protocol, server, &addr.to_string(), cfg.dial_timeout, cfg.scenario_timeout).await;
        handle.abort();
        let report = res?;
        print_report(&cfg.protocol, &report);
        failed |= !report.passed();
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
