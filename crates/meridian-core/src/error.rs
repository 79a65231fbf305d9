//! Error taxonomy shared by every component.
//!
//! Each component owns its own `thiserror` enum; this module only defines the
//! coarse category every variant maps to, so callers can decide how to react
//! without matching on component-specific variants.

use serde::{Deserialize, Serialize};

/// Coarse classification of an aborted operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The caller does not hold the role the operation requires.
    Authorization,
    /// The input is malformed or out of range; the caller must correct it.
    Validation,
    /// Signature gathering failed; gather more signatures or restart the proposal.
    Consensus,
    /// Not enough value was supplied.
    Economic,
    /// The referenced entity is missing or already in a terminal state.
    State,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Consensus => "consensus",
            Self::Economic => "economic",
            Self::State => "state",
        };
        f.write_str(name)
    }
}
