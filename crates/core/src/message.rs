//! Message domain types.
//!
//! These are the value objects that flow out of assembly: role-tagged
//! text ready to hand to a language model, plus the prior turns a
//! caller supplies as history input.

use serde::{Deserialize, Serialize};

/// The role of a message in the assembled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A prior conversation turn, supplied per invocation as history input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who sent this turn.
    pub role: Role,
    /// The text content.
    pub text: String,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A single rendered message in the final assembled output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// Who this message is attributed to.
    pub role: Role,
    /// The fully rendered, budget-compliant text.
    pub text: String,
}

impl RenderedMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}
