//! Verdict of a verification run and its mapping to an exit status.

use crate::dataset::NameId;
use engine_verify_common::VerifyError;
use std::collections::BTreeSet;
use std::fmt;

/// Result of a single verifier run.
#[derive(Debug)]
pub enum Outcome {
    Passed,
    /// The table did not hold the expected number of rows.
    RowCountMismatch { expected: usize, actual: usize },
    /// The collected `(name, id)` pairs differ from the expected set.
    ContentMismatch {
        expected: BTreeSet<NameId>,
        actual: BTreeSet<NameId>,
    },
    /// The engine failed to start, was misconfigured, or failed mid-run.
    EngineError(VerifyError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Process exit status: 0 on success, 1 for every failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

impl From<VerifyError> for Outcome {
    fn from(err: VerifyError) -> Self {
        Outcome::EngineError(err)
    }
}

fn sorted(set: &BTreeSet<NameId>) -> Vec<&NameId> {
    set.iter().collect()
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "Test Passed"),
            Outcome::RowCountMismatch { expected, actual } => {
                write!(f, "FAIL: Expected {} rows, got {}", expected, actual)
            }
            Outcome::ContentMismatch { expected, actual } => {
                writeln!(f, "FAIL: DataFrame contents do not match expected values")?;
                writeln!(f, "Expected: {:?}", sorted(expected))?;
                write!(f, "Actual:   {:?}", sorted(actual))
            }
            Outcome::EngineError(_) => write!(f, "FAIL: Exception during test. See logs above."),
        }
    }
}
