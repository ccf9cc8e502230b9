//! Fault injection for the reference server.

use tokio::sync::oneshot;

/// Text of the error every handler returns in declared-error mode.
pub const BACKEND_SENTINEL: &str = "test shardgate error";
/// Message of the panic raised in injected-fault mode.
pub const FORCED_PANIC_MESSAGE: &str = "test forced panic";
/// Prefix the boundary puts in front of every converted panic.
pub const PANIC_MARKER: &str = "uncaught panic";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FaultMode {
    #[default]
    Normal,
    /// Handlers fail with `BACKEND_SENTINEL`. Streams first emit their descriptors and then
    /// hold until released.
    DeclaredError,
    /// Handlers panic with `FORCED_PANIC_MESSAGE`.
    InjectedFault,
}

impl FaultMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultMode::Normal => "normal",
            FaultMode::DeclaredError => "declared_error",
            FaultMode::InjectedFault => "injected_fault",
        }
    }
}

impl std::fmt::Display for FaultMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Waiting half of a one-shot release gate, held by the server until a stream consumes it.
#[derive(Debug)]
pub struct ReleaseGate {
    rx: oneshot::Receiver<()>,
}

/// Releasing half, held by whoever drives the stream.
#[derive(Debug)]
pub struct ReleaseHandle {
    tx: oneshot::Sender<()>,
}

/// Returns a fresh, unfired gate pair.
pub fn release_gate() -> (ReleaseGate, ReleaseHandle) {
    let (tx, rx) = oneshot::channel();
    (ReleaseGate { rx }, ReleaseHandle { tx })
}

impl ReleaseGate {
    /// Resolves when released. Returns `false` if the handle was dropped without releasing.
    pub async fn wait(self) -> bool {
        self.rx.await.is_ok()
    }
}

impl ReleaseHandle {
    /// Consumes the handle, so a gate can fire at most once.
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}
