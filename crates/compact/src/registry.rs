//! Compactor registry — name→strategy lookup.
//!
//! Owned by the engine, pluggable by the host: built-ins `truncate` and
//! `summary` are always present, and user strategies register by name.
//! Declarative specs carry a type tag; an unrecognized tag is rejected
//! when the spec is materialized.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ctxweave_core::error::{Error, Result};

use crate::strategy::{Compactor, SummaryCompactor, TruncateCompactor};

/// A declarative compactor definition: a registration name plus the
/// type tag of a built-in strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactorSpec {
    /// Name to register under.
    pub name: String,
    /// Built-in strategy tag: `truncate` or `summary`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Named compaction strategies.
#[derive(Clone)]
pub struct CompactorRegistry {
    compactors: HashMap<String, Arc<dyn Compactor>>,
}

impl Default for CompactorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CompactorRegistry {
    /// An empty registry with no strategies at all.
    pub fn empty() -> Self {
        Self {
            compactors: HashMap::new(),
        }
    }

    /// A registry holding the built-in `truncate` and `summary`
    /// strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TruncateCompactor));
        registry.register(Arc::new(SummaryCompactor));
        registry
    }

    /// Register a strategy under its own name.
    pub fn register(&mut self, compactor: Arc<dyn Compactor>) {
        let name = compactor.name().to_string();
        debug!(compactor = %name, "Registered compactor");
        self.compactors.insert(name, compactor);
    }

    /// Materialize a declarative spec: resolve its type tag to a
    /// built-in strategy and register it under the spec's name.
    pub fn register_spec(&mut self, spec: &CompactorSpec) -> Result<()> {
        let compactor: Arc<dyn Compactor> = match spec.kind.as_str() {
            "truncate" => Arc::new(TruncateCompactor),
            "summary" => Arc::new(SummaryCompactor),
            other => return Err(Error::UnknownCompactorType(other.to_string())),
        };
        debug!(compactor = %spec.name, kind = %spec.kind, "Registered compactor from spec");
        self.compactors.insert(spec.name.clone(), compactor);
        Ok(())
    }

    /// Look up a strategy by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Compactor>> {
        self.compactors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CompactorNotFound(name.to_string()))
    }

    /// All registered strategy names.
    pub fn names(&self) -> Vec<&str> {
        self.compactors.keys().map(String::as_str).collect()
    }
}
