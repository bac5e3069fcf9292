//! The command registry: name-keyed lookup over installed command modules.
//!
//! Commands are registered explicitly at startup: the builtin list plus any
//! `[[commands]]` declared in `relay.toml`. A declared command that cannot
//! run (no entry point) is still registered so it shows up in the listing,
//! and resolving it reports `Malformed` rather than `NotFound`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::commands::Command;
use crate::errors::RegistryError;

/// Shown for commands that don't describe themselves.
pub const NO_DESCRIPTION: &str = "No description available.";

/// Name and description of an installed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

impl CommandInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

enum Entry {
    Ready(Arc<dyn Command>),
    Malformed {
        description: Option<String>,
        reason: String,
    },
}

/// Installed command modules, ordered by name.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of modules.
    pub fn with_commands(
        commands: impl IntoIterator<Item = Arc<dyn Command>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for command in commands {
            registry.register(command)?;
        }
        Ok(registry)
    }

    /// Register a runnable module. Names must be unique.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let name = command.name().to_string();
        self.insert(name, Entry::Ready(command))
    }

    /// Register a module that is installed but has no usable entry point.
    pub fn register_malformed(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        reason: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.insert(
            name.into(),
            Entry::Malformed {
                description,
                reason: reason.into(),
            },
        )
    }

    fn insert(&mut self, name: String, entry: Entry) -> Result<(), RegistryError> {
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateCommand { name });
        }
        tracing::trace!(command = %name, "registered command");
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Every installed command with its description, sorted by name.
    pub fn list(&self) -> Vec<CommandInfo> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                let description = match entry {
                    Entry::Ready(cmd) => cmd.description().map(str::to_string),
                    Entry::Malformed { description, .. } => description.clone(),
                };
                CommandInfo::new(
                    name.clone(),
                    description
                        .filter(|d| !d.trim().is_empty())
                        .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
                )
            })
            .collect()
    }

    /// Map a name to its module.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Command>, RegistryError> {
        match self.entries.get(name) {
            Some(Entry::Ready(cmd)) => Ok(cmd.clone()),
            Some(Entry::Malformed { reason, .. }) => Err(RegistryError::Malformed {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(RegistryError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Capture;
    use crate::context::Context;
    use crate::errors::CommandError;
    use async_trait::async_trait;

    struct Named(&'static str, Option<&'static str>);

    #[async_trait]
    impl Command for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> Option<&str> {
            self.1
        }

        async fn execute(&self, _ctx: &mut Context, _args: &[String]) -> Result<Capture, CommandError> {
            Ok(Capture::empty())
        }
    }

    fn registry() -> Registry {
        Registry::with_commands([
            Arc::new(Named("zeta", Some("Last one"))) as Arc<dyn Command>,
            Arc::new(Named("alpha", None)),
            Arc::new(Named("mid", Some("  "))),
        ])
        .unwrap()
    }

    #[test]
    fn test_list_is_sorted_with_placeholder_descriptions() {
        let list = registry().list();
        let names: Vec<_> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(list[0].description, NO_DESCRIPTION);
        assert_eq!(list[1].description, NO_DESCRIPTION);
        assert_eq!(list[2].description, "Last one");
    }

    #[test]
    fn test_resolve_known_command() {
        let cmd = registry().resolve("alpha").unwrap();
        assert_eq!(cmd.name(), "alpha");
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let err = registry().resolve("bogus").err().unwrap();
        assert!(matches!(err, RegistryError::NotFound { name } if name == "bogus"));
    }

    #[test]
    fn test_resolve_malformed_is_distinct_from_not_found() {
        let mut reg = registry();
        reg.register_malformed("broken", Some("Half installed".into()), "no 'run' entry")
            .unwrap();

        let err = reg.resolve("broken").err().unwrap();
        match err {
            RegistryError::Malformed { name, reason } => {
                assert_eq!(name, "broken");
                assert!(reason.contains("run"));
            }
            other => panic!("Expected Malformed, got {other:?}"),
        }

        // Still listed.
        assert!(reg.list().iter().any(|c| c.name == "broken" && c.description == "Half installed"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut reg = registry();
        let err = reg.register(Arc::new(Named("alpha", None))).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand { name } if name == "alpha"));
        let err = reg.register_malformed("zeta", None, "x").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand { .. }));
        assert_eq!(reg.len(), 3);
    }
}
