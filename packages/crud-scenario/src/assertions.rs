//! Assertion recorder.
//!
//! Records labelled boolean checks, compares the number executed with
//! the number declared up front, and reports once the run concludes.

use std::fmt;

/// Result of one labelled check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub label: String,
    pub passed: bool,
}

/// Collects assertion outcomes for one run.
#[derive(Debug, Default)]
pub struct Assertions {
    expected: Option<usize>,
    outcomes: Vec<Outcome>,
    concluded: bool,
}

impl Assertions {
    /// Creates an empty recorder with no expectation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares how many assertions the run must execute.
    pub fn expect(&mut self, count: usize) {
        self.expected = Some(count);
    }

    /// Records a check and returns its condition.
    pub fn ok(&mut self, condition: bool, label: &str) -> bool {
        if condition {
            tracing::info!("ok {} - {}", self.outcomes.len() + 1, label);
        } else {
            tracing::warn!("not ok {} - {}", self.outcomes.len() + 1, label);
        }
        self.outcomes.push(Outcome {
            label: label.to_string(),
            passed: condition,
        });
        condition
    }

    /// Returns the number of checks recorded so far.
    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }

    /// Marks the run as concluded and returns the report.
    ///
    /// Calling it again returns the same report.
    pub fn done(&mut self) -> AssertionReport {
        if !self.concluded {
            self.concluded = true;
            tracing::debug!(
                "Run concluded with {} assertions (expected {:?})",
                self.outcomes.len(),
                self.expected
            );
        }
        AssertionReport {
            expected: self.expected,
            outcomes: self.outcomes.clone(),
            concluded: true,
        }
    }
}

/// Outcomes of a concluded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionReport {
    pub expected: Option<usize>,
    pub outcomes: Vec<Outcome>,
    pub concluded: bool,
}

impl AssertionReport {
    /// Returns the number of checks executed.
    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns the checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// Returns true if the executed count differs from the declared one.
    pub fn count_mismatch(&self) -> bool {
        self.expected.is_some_and(|expected| expected != self.executed())
    }

    /// Concluded, every check passed and the count matched.
    pub fn passed(&self) -> bool {
        self.concluded && self.failures().next().is_none() && !self.count_mismatch()
    }
}

impl fmt::Display for AssertionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, outcome) in self.outcomes.iter().enumerate() {
            let status = if outcome.passed { "ok" } else { "not ok" };
            writeln!(f, "{} {} - {}", status, index + 1, outcome.label)?;
        }
        match self.expected {
            Some(expected) if expected != self.executed() => write!(
                f,
                "expected {} assertions, {} executed",
                expected,
                self.executed()
            ),
            _ => write!(f, "{} assertions executed", self.executed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_passing_with_matching_count() {
        let mut assertions = Assertions::new();
        assertions.expect(2);
        assert!(assertions.ok(true, "first"));
        assert!(assertions.ok(true, "second"));
        let report = assertions.done();
        assert!(report.passed());
        assert_eq!(report.executed(), 2);
    }

    #[test]
    fn test_truncated_run_fails() {
        let mut assertions = Assertions::new();
        assertions.expect(6);
        assertions.ok(true, "Unsaved");
        let report = assertions.done();
        assert!(report.count_mismatch());
        assert!(!report.passed());
        assert!(report.to_string().ends_with("expected 6 assertions, 1 executed"));
    }

    #[test]
    fn test_failed_check_fails_report() {
        let mut assertions = Assertions::new();
        assertions.expect(2);
        assertions.ok(true, "first");
        assert!(!assertions.ok(false, "second"));
        let report = assertions.done();
        assert!(!report.passed());
        assert_eq!(
            report.failures().map(|o| o.label.as_str()).collect::<Vec<_>>(),
            vec!["second"]
        );
        assert!(report.to_string().contains("not ok 2 - second"));
    }

    #[test]
    fn test_done_is_idempotent() {
        let mut assertions = Assertions::new();
        assertions.ok(true, "only");
        let first = assertions.done();
        let second = assertions.done();
        assert_eq!(first, second);
        assert!(first.passed());
    }

    #[test]
    fn test_unconcluded_report_never_passes() {
        let report = AssertionReport {
            expected: None,
            outcomes: Vec::new(),
            concluded: false,
        };
        assert!(!report.passed());
    }
}
