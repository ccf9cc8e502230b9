//! Assertion helpers shared by the scenario bodies.

use std::fmt::Debug;

use anyhow::{bail, ensure, Result};

use crate::error::GateResult;
use crate::server::{FaultMode, BACKEND_SENTINEL, FORCED_PANIC_MESSAGE, PANIC_MARKER};

/// Substrings a failure must carry in a given fault mode.
pub fn fault_needles(mode: FaultMode) -> Vec<String> {
    match mode {
        FaultMode::Normal => Vec::new(),
        FaultMode::DeclaredError => vec![BACKEND_SENTINEL.to_string()],
        FaultMode::InjectedFault => vec![format!("{}: {}", PANIC_MARKER, FORCED_PANIC_MESSAGE), PANIC_MARKER.to_string()],
    }
}

pub fn expect_error_containing<T: Debug>(what: &str, res: GateResult<T>, needles: &[String]) -> Result<()> {
    match res {
        Ok(v) => bail!("{}: got {:?}, want an error containing {:?}", what, v, needles),
        Err(e) => {
            let msg = e.to_string();
            for needle in needles {
                ensure!(msg.contains(needle.as_str()), "{}: error {:?} does not contain {:?}", what, msg, needle);
            }
            Ok(())
        }
    }
}

pub fn expect_error_exact<T: Debug>(what: &str, res: GateResult<T>, want: &str) -> Result<()> {
    match res {
        Ok(v) => bail!("{}: got {:?}, want error {:?}", what, v, want),
        Err(e) => {
            ensure!(e.to_string() == want, "{}: got error {:?}, want {:?}", what, e.to_string(), want);
            Ok(())
        }
    }
}

pub fn expect_ok<T>(what: &str, res: GateResult<T>) -> Result<T> {
    res.map_err(|e| anyhow::anyhow!("{}: unexpected error: {}", what, e))
}

pub fn expect_equal<T: Debug + PartialEq>(what: &str, got: &T, want: &T) -> Result<()> {
    ensure!(got == want, "{}: got {:?}, want {:?}", what, got, want);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;

    #[test]
    fn needles_per_mode() {
        assert!(fault_needles(FaultMode::Normal).is_empty());
        let panic_text = "uncaught panic: test forced panic\nstack";
        let res: GateResult<()> = Err(GateError::panic(panic_text));
        assert!(expect_error_containing("x", res, &fault_needles(FaultMode::InjectedFault)).is_ok());
        let res: GateResult<()> = Err(GateError::backend("other"));
        assert!(expect_error_containing("x", res, &fault_needles(FaultMode::DeclaredError)).is_err());
    }

    #[test]
    fn exact_match_rejects_success() {
        assert!(expect_error_exact("x", Ok::<u8, GateError>(1), "app error").is_err());
        assert!(expect_error_exact::<u8>("x", Err(GateError::application("app error")), "app error").is_ok());
    }
}
