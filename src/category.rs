//! Artifact categories for test generation.
//!
//! A [`Category`] is the unit of parallel dispatch and of verification
//! aggregation. The set is closed and known at compile time; adding a
//! category is a compile-checked change at every match site.
//!
//! ## Example
//!
//! ```
//! use testsmith::category::Category;
//!
//! assert_eq!(Category::Unit.dir_name(), "unit_tests");
//! assert_eq!(Category::ALL.len(), 3);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A class of test artifacts produced by one specialist worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Tests for individual functions, classes, and methods in isolation.
    Unit,
    /// End-to-end tests for complete user workflows.
    Functional,
    /// Tests for component interactions: API, service and storage layers together.
    Integration,
}

impl Category {
    /// The fixed enumeration order used for deterministic merges and
    /// per-category report fields.
    pub const ALL: [Category; 3] = [Category::Unit, Category::Functional, Category::Integration];

    /// Subdirectory under the artifact root where this category's files live.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit_tests",
            Self::Functional => "functional_tests",
            Self::Integration => "integration_tests",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unit => "Unit",
            Self::Functional => "Functional",
            Self::Integration => "Integration",
        }
    }

    /// Lowercase hyphenated identifier used for worker labels and logs.
    pub fn worker_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit-tester",
            Self::Functional => "functional-tester",
            Self::Integration => "integration-tester",
        }
    }

    /// What this category's tests are expected to cover. Used when briefing
    /// specialist workers.
    pub fn focus(&self) -> &'static str {
        match self {
            Self::Unit => "individual functions, classes and methods, with external dependencies mocked",
            Self::Functional => "complete user workflows exercised end to end through the service layer",
            Self::Integration => "interactions between components: API to service to storage, real data flow",
        }
    }

    /// Position of this category in [`Category::ALL`].
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Unit => 0,
            Self::Functional => 1,
            Self::Integration => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Parse a category from common identifiers: `unit`, `unit-tester`,
    /// `unit_tests`, and so on. Unknown strings are an error; the set is closed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unit" | "unit-tester" | "unit_tester" | "unit_tests" => Ok(Self::Unit),
            "functional" | "functional-tester" | "functional_tester" | "functional_tests" => {
                Ok(Self::Functional)
            }
            "integration" | "integration-tester" | "integration_tester" | "integration_tests" => {
                Ok(Self::Integration)
            }
            other => Err(anyhow::anyhow!("unknown category: {other}")),
        }
    }
}
