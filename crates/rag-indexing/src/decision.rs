//! Rebuild decision for a build against an existing index.
//!
//! | state before       | force | decision                  |
//! |--------------------|-------|---------------------------|
//! | absent             | any   | rebuild (fresh build)     |
//! | present-empty      | any   | rebuild                   |
//! | present-nonempty   | true  | rebuild                   |
//! | present-nonempty   | false | asked from the prompt     |

use std::fmt;
use std::str::FromStr;

use rag_vector::IndexState;
use serde::{Deserialize, Serialize};

/// What a build does with an existing, populated index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildDecision {
    /// Leave the index untouched and stop
    Skip,
    /// Discard every record and build from scratch
    Rebuild,
    /// Keep existing records and embed only unseen documents
    Incremental,
}

impl fmt::Display for RebuildDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RebuildDecision::Skip => "skip",
            RebuildDecision::Rebuild => "rebuild",
            RebuildDecision::Incremental => "incremental",
        })
    }
}

impl FromStr for RebuildDecision {
    type Err = String;

    /// Accepts full names and the one-letter prompt answers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "skip" => Ok(RebuildDecision::Skip),
            "r" | "rebuild" => Ok(RebuildDecision::Rebuild),
            "i" | "incremental" => Ok(RebuildDecision::Incremental),
            other => Err(format!("unknown choice '{}'", other)),
        }
    }
}

/// Produces a decision when the index is already populated.
///
/// A fixed [`RebuildDecision`] answers for itself. [`IndexBuilder::build`]
/// calls `choose` on the async runtime, so implementations must not block;
/// interactive callers resolve the decision first and pass it in.
///
/// [`IndexBuilder::build`]: crate::IndexBuilder::build
pub trait DecisionPrompt: Send + Sync {
    fn choose(&self, state: IndexState) -> RebuildDecision;
}

impl DecisionPrompt for RebuildDecision {
    fn choose(&self, _state: IndexState) -> RebuildDecision {
        *self
    }
}

/// Resolve the decision for a build.
///
/// The prompt is consulted only for a populated index without `force`.
pub fn resolve_decision(
    state: IndexState,
    force: bool,
    prompt: &dyn DecisionPrompt,
) -> RebuildDecision {
    match state {
        IndexState::Absent | IndexState::PresentEmpty => RebuildDecision::Rebuild,
        IndexState::PresentNonEmpty if force => RebuildDecision::Rebuild,
        IndexState::PresentNonEmpty => prompt.choose(state),
    }
}
