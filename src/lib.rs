pub mod error;
pub mod identity;
pub mod proto;
pub mod session;
pub mod fixtures;
pub mod server;
pub mod conn;
pub mod conformance;
pub mod config;

pub use error::{GateError, GateResult};

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage: tprintln!("frame: {:?}", frame);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
