use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    /// Empty when the scenario passed. Includes failures the server recorded while it ran.
    pub failures: Vec<String>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool { self.failures.is_empty() }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn push(&mut self, outcome: ScenarioOutcome) { self.outcomes.push(outcome); }

    pub fn passed(&self) -> bool { self.outcomes.iter().all(ScenarioOutcome::passed) }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn ensure_passed(&self) -> anyhow::Result<()> {
        if self.passed() {
            return Ok(());
        }
        anyhow::bail!("{} of {} scenarios failed\n{}", self.failed().count(), self.outcomes.len(), self)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for o in &self.outcomes {
            writeln!(f, "{:<4} {}", if o.passed() { "ok" } else { "FAIL" }, o.name)?;
            for failure in &o.failures {
                for (i, line) in failure.lines().enumerate() {
                    let lead = if i == 0 { "  - " } else { "    " };
                    writeln!(f, "{}{}", lead, line)?;
                }
            }
        }
        let failed = self.failed().count();
        write!(f, "{} scenarios, {} passed, {} failed", self.outcomes.len(), self.outcomes.len() - failed, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_summarizes_failures() {
        let mut r = SuiteReport::default();
        r.push(ScenarioOutcome { name: "Execute/normal".into(), failures: vec![] });
        assert!(r.passed());
        r.push(ScenarioOutcome { name: "Begin/declared_error".into(), failures: vec!["got Ok".into()] });
        assert!(!r.passed());
        assert_eq!(r.failed().count(), 1);
        let text = r.to_string();
        assert!(text.contains("FAIL Begin/declared_error"));
        assert!(text.ends_with("2 scenarios, 1 passed, 1 failed"));
        assert!(r.ensure_passed().is_err());
    }
}
