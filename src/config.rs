//!
//! shardgate configuration
//! -----------------------
//! Process settings for the binaries. Environment variables provide the base values and
//! command-line flags override them. Values that fail to parse are ignored.

use std::env;
use std::time::Duration;

use crate::conformance::DEFAULT_SCENARIO_TIMEOUT;

pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_HTTP_PORT: u16 = 15991;
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Dialer name the conformance binary connects through.
    pub protocol: String,
    /// Address the HTTP binding listens on. The conformance binary dials the same address.
    pub address: Option<String>,
    pub listen_port: u16,
    pub dial_timeout: Duration,
    pub scenario_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            address: None,
            listen_port: DEFAULT_HTTP_PORT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            scenario_timeout: DEFAULT_SCENARIO_TIMEOUT,
        }
    }
}

fn arg_val(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i + 1 < args.len() {
        if args[i] == flag { return Some(args[i + 1].clone()); }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_millis(v: Option<String>) -> Option<Duration> {
    v.and_then(|s| s.trim().parse::<u64>().ok()).map(Duration::from_millis)
}

impl GateConfig {
    /// Reads the process environment and `std::env::args`.
    pub fn load() -> Self {
        let args: Vec<String> = env::args().collect();
        Self::from_sources(|name| env::var(name).ok(), &args)
    }

    pub fn from_sources<F>(env_var: F, args: &[String]) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let protocol = arg_val(args, "--protocol")
            .or_else(|| env_var("SHARDGATE_PROTOCOL"))
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.protocol);
        let address = arg_val(args, "--address")
            .or_else(|| env_var("SHARDGATE_ADDRESS"))
            .filter(|s| !s.is_empty());
        let listen_port = arg_val(args, "--http-port")
            .and_then(|s| s.parse::<u16>().ok())
            .or_else(|| env_var("SHARDGATE_HTTP_PORT").and_then(|s| s.parse::<u16>().ok()))
            .unwrap_or(defaults.listen_port);
        let dial_timeout = parse_millis(arg_val(args, "--timeout-ms"))
            .or_else(|| parse_millis(env_var("SHARDGATE_DIAL_TIMEOUT_MS")))
            .unwrap_or(defaults.dial_timeout);
        let scenario_timeout = parse_millis(env_var("SHARDGATE_SCENARIO_TIMEOUT_MS")).unwrap_or(defaults.scenario_timeout);

        Self { protocol, address, listen_port, dial_timeout, scenario_timeout }
    }

    /// Listen address for the server: the configured one, else all interfaces on `listen_port`.
    pub fn listen_address(&self) -> String {
        self.address.clone().unwrap_or_else(|| format!("0.0.0.0:{}", self.listen_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = GateConfig::from_sources(|_| None, &args(&["shardgate"]));
        assert_eq!(cfg, GateConfig::default());
        assert_eq!(cfg.listen_address(), format!("0.0.0.0:{}", DEFAULT_HTTP_PORT));
    }

    #[test]
    fn flags_override_environment() {
        let mut env = HashMap::new();
        env.insert("SHARDGATE_HTTP_PORT", "9000".to_string());
        env.insert("SHARDGATE_PROTOCOL", "mem".to_string());
        env.insert("SHARDGATE_DIAL_TIMEOUT_MS", "250".to_string());
        let cfg = GateConfig::from_sources(
            |k| env.get(k).cloned(),
            &args(&["shardgate", "--http-port", "9100", "--address", "gate:1"]),
        );
        assert_eq!(cfg.listen_port, 9100);
        assert_eq!(cfg.protocol, "mem");
        assert_eq!(cfg.dial_timeout, Duration::from_millis(250));
        assert_eq!(cfg.listen_address(), "gate:1");
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = GateConfig::from_sources(
            |k| (k == "SHARDGATE_SCENARIO_TIMEOUT_MS").then(|| "soon".to_string()),
            &args(&["shardgate", "--http-port", "99999", "--timeout-ms", "-1"]),
        );
        assert_eq!(cfg.listen_port, DEFAULT_HTTP_PORT);
        assert_eq!(cfg.dial_timeout, DEFAULT_DIAL_TIMEOUT);
        assert_eq!(cfg.scenario_timeout, DEFAULT_SCENARIO_TIMEOUT);
    }

    #[test]
    fn empty_protocol_and_address_are_ignored() {
        let cfg = GateConfig::from_sources(
            |k| (k == "SHARDGATE_ADDRESS").then(|| "10.0.0.1:7000".to_string()),
            &args(&["shardgate", "--protocol", "", "--address", ""]),
        );
        assert_eq!(cfg.protocol, DEFAULT_PROTOCOL);
        assert_eq!(cfg.address, None);
    }
}
