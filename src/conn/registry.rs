//! Named transport bindings. A dialer turns `(address, timeout)` into a connection; both are
//! forwarded verbatim.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{GateConn, GateConnImpl};
use crate::error::{GateError, GateResult};

pub type DialFuture = BoxFuture<'static, GateResult<Arc<dyn GateConnImpl>>>;
pub type Dialer = Arc<dyn Fn(String, Duration) -> DialFuture + Send + Sync>;

pub struct DialerRegistry {
    dialers: RwLock<HashMap<String, Dialer>>,
}

impl Default for DialerRegistry {
    fn default() -> Self { Self::new() }
}

impl DialerRegistry {
    pub fn new() -> Self { Self { dialers: RwLock::new(HashMap::new()) } }

    /// Registry with the bindings that ship with the crate (`http`).
    pub fn with_builtin() -> Self {
        let reg = Self::new();
        reg.register("http", super::http::dialer());
        reg
    }

    /// Registers `dialer` under `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, dialer: Dialer) {
        let name = name.into();
        if self.dialers.write().insert(name.clone(), dialer).is_some() {
            warn!("dialer for protocol {} replaced", name);
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dialers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn dial(&self, name: &str, address: &str, timeout: Duration) -> GateResult<GateConn> {
        let dialer = self
            .dialers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GateError::transport(format!("no dialer registered for protocol: {}", name)))?;
        debug!("dialing {} at {}", name, address);
        let imp = match tokio::time::timeout(timeout, dialer(address.to_string(), timeout)).await {
            Ok(res) => res?,
            Err(_) => return Err(GateError::transport(format!("dial {} {}: timed out after {:?}", name, address, timeout))),
        };
        Ok(GateConn::new(imp))
    }
}

static DEFAULT_REGISTRY: Lazy<DialerRegistry> = Lazy::new(DialerRegistry::with_builtin);

pub fn default_registry() -> &'static DialerRegistry { &DEFAULT_REGISTRY }

pub fn register_dialer(name: impl Into<String>, dialer: Dialer) {
    DEFAULT_REGISTRY.register(name, dialer);
}

pub async fn dial(name: &str, address: &str, timeout: Duration) -> GateResult<GateConn> {
    DEFAULT_REGISTRY.dial(name, address, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_protocol_is_reported_by_name() {
        let reg = DialerRegistry::new();
        let err = reg.dial("carrier-pigeon", "nowhere", Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.to_string(), "no dialer registered for protocol: carrier-pigeon");
    }

    #[test]
    fn builtin_registry_knows_http() {
        assert_eq!(DialerRegistry::with_builtin().names(), vec!["http".to_string()]);
        assert!(default_registry().names().contains(&"http".to_string()));
    }

    #[tokio::test]
    async fn dial_forwards_address_and_timeout() {
        let reg = DialerRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen2 = seen.clone();
        reg.register(
            "probe",
            Arc::new(move |address: String, timeout: Duration| {
                *seen2.lock() = Some((address, timeout));
                Box::pin(async { Err::<Arc<dyn GateConnImpl>, _>(GateError::transport("probe refuses")) }) as DialFuture
            }),
        );
        let err = reg.dial("probe", "opaque://addr", Duration::from_millis(1234)).await.unwrap_err();
        assert_eq!(err.to_string(), "probe refuses");
        assert_eq!(*seen.lock(), Some(("opaque://addr".to_string(), Duration::from_millis(1234))));
    }
}
