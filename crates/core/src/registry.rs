//! Context and pack registries — immutable name→declaration tables.
//!
//! Registries are built once at startup, validating every declaration
//! on the way in (fail fast), and then passed explicitly into the
//! assembler. No ambient global state: assembly stays side-effect-free
//! and trivially testable in isolation.

use std::collections::HashMap;

use tracing::debug;

use crate::declaration::ContextDecl;
use crate::error::{Error, Result};
use crate::pack::PackDecl;

/// Named context declarations.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    contexts: HashMap<String, ContextDecl>,
}

impl ContextRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a context under `name`.
    pub fn register(&mut self, name: impl Into<String>, decl: ContextDecl) -> Result<()> {
        decl.validate()?;
        let name = name.into();
        debug!(context = %name, "Registered context");
        self.contexts.insert(name, decl);
        Ok(())
    }

    /// Look up a context by name.
    pub fn get(&self, name: &str) -> Result<&ContextDecl> {
        self.contexts
            .get(name)
            .ok_or_else(|| Error::ContextNotFound(name.to_string()))
    }

    /// All registered context names.
    pub fn names(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Named pack declarations.
#[derive(Debug, Clone, Default)]
pub struct PackRegistry {
    packs: HashMap<String, PackDecl>,
}

impl PackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a pack under its declared name.
    pub fn register(&mut self, pack: PackDecl) -> Result<()> {
        pack.validate()?;
        debug!(pack = %pack.name, "Registered pack");
        self.packs.insert(pack.name.clone(), pack);
        Ok(())
    }

    /// Look up a pack by name.
    pub fn get(&self, name: &str) -> Result<&PackDecl> {
        self.packs
            .get(name)
            .ok_or_else(|| Error::PackNotFound(name.to_string()))
    }

    /// All registered pack names.
    pub fn names(&self) -> Vec<&str> {
        self.packs.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{BudgetSpec, MessageSpec, PackBudgetSpec};

    fn minimal_context() -> ContextDecl {
        ContextDecl::new(
            MessageSpec::content("sys"),
            MessageSpec::content("hi"),
            BudgetSpec::max_tokens(100),
        )
    }

    #[test]
    fn lookup_of_missing_context_names_it() {
        let registry = ContextRegistry::new();
        let err = registry.get("chat").unwrap_err();
        assert_eq!(err.to_string(), "Context 'chat' not defined");
    }

    #[test]
    fn lookup_of_missing_pack_names_it() {
        let registry = PackRegistry::new();
        let err = registry.get("evidence").unwrap_err();
        assert_eq!(err.to_string(), "Context pack 'evidence' is not available");
    }

    #[test]
    fn registration_validates_declarations() {
        let mut registry = ContextRegistry::new();
        let invalid = ContextDecl::new(
            MessageSpec::content("sys"),
            MessageSpec::content("hi"),
            BudgetSpec::default(),
        );
        assert!(registry.register("bad", invalid).is_err());
        assert!(registry.is_empty());

        assert!(registry.register("good", minimal_context()).is_ok());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("good").is_ok());
    }

    #[test]
    fn pack_registration_round_trips() {
        let mut registry = PackRegistry::new();
        registry
            .register(PackDecl::static_content(
                "notes",
                "some notes",
                PackBudgetSpec::max_tokens(10),
            ))
            .unwrap();
        assert_eq!(registry.get("notes").unwrap().name, "notes");
        assert_eq!(registry.names(), vec!["notes"]);
    }
}
