//! Document, observation, and scope enums for Engram.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`
//! unless a wire contract dictates otherwise (`Scope` serializes its unset
//! variant as the empty string, matching the stored column value).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// DocType
// ---------------------------------------------------------------------------

/// Kind of content a vector row was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Observation,
    SessionSummary,
    UserPrompt,
    Pattern,
}

impl DocType {
    /// String representation used in SQL storage and cache fingerprints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::SessionSummary => "session_summary",
            Self::UserPrompt => "user_prompt",
            Self::Pattern => "pattern",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(Self::Observation),
            "session_summary" => Ok(Self::SessionSummary),
            "user_prompt" => Ok(Self::UserPrompt),
            "pattern" => Ok(Self::Pattern),
            other => Err(format!("unknown doc_type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// ObservationType
// ---------------------------------------------------------------------------

/// Category of an observation extracted from an assistant session.
///
/// Unknown values arriving from the SDK are coerced to [`Self::Change`] at
/// extraction time; see [`crate::sdk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    Bugfix,
    Feature,
    Refactor,
    Change,
    Discovery,
    Decision,
}

impl ObservationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bugfix => "bugfix",
            Self::Feature => "feature",
            Self::Refactor => "refactor",
            Self::Change => "change",
            Self::Discovery => "discovery",
            Self::Decision => "decision",
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ObservationType {
    /// Unknown SDK types coerce to `change`; it is also the neutral default.
    fn default() -> Self {
        Self::Change
    }
}

impl FromStr for ObservationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bugfix" => Ok(Self::Bugfix),
            "feature" => Ok(Self::Feature),
            "refactor" => Ok(Self::Refactor),
            "change" => Ok(Self::Change),
            "discovery" => Ok(Self::Discovery),
            "decision" => Ok(Self::Decision),
            other => Err(format!("unknown observation type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Visibility of a vector row: project-local or globally shared.
///
/// Global rows intentionally leak across projects: a `project` query filter
/// matches `project = :p OR scope = 'global'`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "project")]
    Project,
    #[serde(rename = "global")]
    Global,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl Scope {
    /// Stored column value; unset scope is the empty string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
            Self::Unset => "",
        }
    }

    /// Parse a stored column value. Anything unrecognized maps to unset.
    #[must_use]
    pub fn from_column(value: &str) -> Self {
        match value {
            "project" => Self::Project,
            "global" => Self::Global,
            _ => Self::Unset,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SummaryField
// ---------------------------------------------------------------------------

/// The six fields of a session summary, each embedded as its own vector row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryField {
    Request,
    Investigated,
    Learned,
    Completed,
    NextSteps,
    Notes,
}

impl SummaryField {
    /// All fields in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Request,
        Self::Investigated,
        Self::Learned,
        Self::Completed,
        Self::NextSteps,
        Self::Notes,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Investigated => "investigated",
            Self::Learned => "learned",
            Self::Completed => "completed",
            Self::NextSteps => "next_steps",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for SummaryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PatternField
// ---------------------------------------------------------------------------

/// The three embedded fields of a stored pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternField {
    Name,
    Description,
    Recommendation,
}

impl PatternField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for PatternField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Concept
// ---------------------------------------------------------------------------

/// Recognized concept tags attached to observations.
///
/// Concepts use kebab-case on the wire (`best-practice`). Unknown concepts
/// arriving from the SDK are dropped with a warning at extraction time; the
/// importance-scoring weight table only covers this fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Concept {
    Security,
    Gotcha,
    BestPractice,
    AntiPattern,
    Performance,
    Architecture,
    Concurrency,
    Database,
    Api,
    ErrorHandling,
    Testing,
    Configuration,
    Dependency,
}

impl Concept {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Gotcha => "gotcha",
            Self::BestPractice => "best-practice",
            Self::AntiPattern => "anti-pattern",
            Self::Performance => "performance",
            Self::Architecture => "architecture",
            Self::Concurrency => "concurrency",
            Self::Database => "database",
            Self::Api => "api",
            Self::ErrorHandling => "error-handling",
            Self::Testing => "testing",
            Self::Configuration => "configuration",
            Self::Dependency => "dependency",
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Concept {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "security" => Ok(Self::Security),
            "gotcha" => Ok(Self::Gotcha),
            "best-practice" => Ok(Self::BestPractice),
            "anti-pattern" => Ok(Self::AntiPattern),
            "performance" => Ok(Self::Performance),
            "architecture" => Ok(Self::Architecture),
            "concurrency" => Ok(Self::Concurrency),
            "database" => Ok(Self::Database),
            "api" => Ok(Self::Api),
            "error-handling" => Ok(Self::ErrorHandling),
            "testing" => Ok(Self::Testing),
            "configuration" => Ok(Self::Configuration),
            "dependency" => Ok(Self::Dependency),
            other => Err(format!("unknown concept '{other}'")),
        }
    }
}
