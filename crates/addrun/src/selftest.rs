//! # Self-Test Suite
//!
//! A fixed table of additions run through the bridge, with a plain-text
//! report for the test panel.

use crate::bridge::BridgeInvoker;
use crate::bridge::InvokeError;

const RULE: &str = "==================================================";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfTestCase {
    pub name: &'static str,
    pub a: f64,
    pub b: f64,
    pub expected: f64,
    /// Zero means exact equality.
    pub tolerance: f64,
}

impl SelfTestCase {
    const fn exact(name: &'static str, a: f64, b: f64, expected: f64) -> Self {
        Self { name, a, b, expected, tolerance: 0.0 }
    }

    const fn approx(name: &'static str, a: f64, b: f64, expected: f64) -> Self {
        Self { name, a, b, expected, tolerance: 1e-4 }
    }

    pub fn accepts(&self, value: f64) -> bool {
        (value - self.expected).abs() <= self.tolerance
    }
}

pub const CASES: [SelfTestCase; 10] = [
    SelfTestCase::exact("test_add_positive_numbers", 5.0, 3.0, 8.0),
    SelfTestCase::exact("test_add_positive_numbers", 100.0, 200.0, 300.0),
    SelfTestCase::exact("test_add_with_zero", 0.0, 5.0, 5.0),
    SelfTestCase::exact("test_add_with_zero", 10.0, 0.0, 10.0),
    SelfTestCase::exact("test_add_with_zero", 0.0, 0.0, 0.0),
    SelfTestCase::exact("test_add_negative_numbers", -5.0, -3.0, -8.0),
    SelfTestCase::exact("test_add_negative_numbers", -10.0, 5.0, -5.0),
    SelfTestCase::exact("test_add_negative_numbers", 10.0, -5.0, 5.0),
    SelfTestCase::approx("test_add_floats", 2.5, 3.7, 6.2),
    SelfTestCase::approx("test_add_floats", 0.1, 0.2, 0.3),
];

#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Value(f64),
    /// The runtime rejected the call.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub case: SelfTestCase,
    pub outcome: CaseOutcome,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        match self.outcome {
            CaseOutcome::Value(value) => self.case.accepts(value),
            CaseOutcome::Error(_) => false,
        }
    }

    fn line(&self) -> String {
        let case = &self.case;
        let label = format!("{} ({} + {})", case.name, case.a, case.b);
        match &self.outcome {
            CaseOutcome::Value(value) if self.passed() => {
                format!("✓ {}: PASSED ({})", label, value)
            }
            CaseOutcome::Value(value) => {
                format!("✗ {}: FAILED (expected {}, got {})", label, case.expected, value)
            }
            CaseOutcome::Error(msg) => format!("✗ {}: ERROR ({})", label, msg),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfTestReport {
    pub results: Vec<CaseResult>,
}

impl SelfTestReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// One line per case followed by a summary block.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.results.iter().map(CaseResult::line).collect();
        lines.push(String::new());
        lines.push(RULE.to_string());
        lines.push("Test Summary:".to_string());
        lines.push(RULE.to_string());
        lines.push(format!("Total tests: {}", self.total()));
        lines.push(format!("Passed: {}", self.passed()));
        lines.push(format!("Failed: {}", self.failed()));
        lines.push(RULE.to_string());
        lines.join("\n")
    }
}

/// Runs every case in [`CASES`] through `bridge`.
///
/// A case the runtime rejects is recorded as failed and the suite carries
/// on. Only an unready runtime aborts the run.
pub async fn run_self_tests(bridge: &BridgeInvoker) -> Result<SelfTestReport, InvokeError> {
    let mut report = SelfTestReport::default();
    for case in CASES {
        let outcome = match bridge.invoke(case.a, case.b).await {
            Ok(invocation) => CaseOutcome::Value(invocation.value),
            Err(InvokeError::RuntimeNotReady) => return Err(InvokeError::RuntimeNotReady),
            Err(InvokeError::InvocationFailed(msg)) => CaseOutcome::Error(msg),
        };
        report.results.push(CaseResult { case, outcome });
    }
    Ok(report)
}
