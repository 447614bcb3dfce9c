//! Tool Registry
//!
//! Thread-safe map from key to tool. A tool's name and each of its aliases
//! are separate keys in one flat namespace, all pointing at the same shared
//! tool. Registration is all-or-nothing; unregistration removes one key.

use super::error::RegistryError;
use super::tool::Tool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Concurrent key → tool map
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("keys", &self.list_names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its name and every alias
    ///
    /// Fails without modifying the registry if the name is empty, the tool
    /// declares no platforms, or any of its keys is already taken.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if tool.supported_platforms().is_empty() {
            return Err(RegistryError::NoPlatforms(name));
        }

        let aliases: Vec<String> = tool
            .aliases()
            .iter()
            .filter(|a| !a.trim().is_empty())
            .cloned()
            .collect();

        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);

        if tools.contains_key(&name) {
            return Err(RegistryError::NameConflict(name));
        }
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(name.as_str());
        for alias in &aliases {
            if tools.contains_key(alias) || !seen.insert(alias.as_str()) {
                return Err(RegistryError::AliasConflict(alias.clone()));
            }
        }

        for alias in &aliases {
            tools.insert(alias.clone(), Arc::clone(&tool));
        }
        tools.insert(name.clone(), tool);

        info!(tool = %name, aliases = aliases.len(), "Registered tool");
        Ok(())
    }

    /// Resolve a name or alias
    pub fn get(&self, key: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Distinct tools, sorted by name
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut distinct: Vec<Arc<dyn Tool>> = Vec::new();
        for tool in tools.values() {
            if !distinct.iter().any(|t| Arc::ptr_eq(t, tool)) {
                distinct.push(Arc::clone(tool));
            }
        }
        distinct.sort_by(|a, b| a.name().cmp(b.name()));
        distinct
    }

    /// Every key, names and aliases together, sorted
    pub fn list_names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a single key
    ///
    /// Other keys pointing at the same tool stay resolvable.
    pub fn unregister(&self, key: &str) -> Option<Arc<dyn Tool>> {
        let removed = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            debug!(key, "Unregistered tool key");
        }
        removed
    }

    /// Number of keys (not distinct tools)
    pub fn size(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{
        ExecuteResult, ExecutionContext, ParameterSchema, Platform, ToolError,
    };
    use async_trait::async_trait;
    use serde_json::Value;

    struct StubTool {
        name: String,
        aliases: Vec<String>,
        platforms: Vec<Platform>,
        schema: ParameterSchema,
    }

    impl StubTool {
        fn new(name: &str, aliases: &[&str]) -> Arc<dyn Tool> {
            Arc::new(Self {
                name: name.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                platforms: vec![Platform::Windows],
                schema: ParameterSchema::empty(),
            })
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn parameter_schema(&self) -> &ParameterSchema {
            &self.schema
        }

        fn requires_confirmation(&self) -> bool {
            false
        }

        fn supported_platforms(&self) -> &[Platform] {
            &self.platforms
        }

        fn aliases(&self) -> &[String] {
            &self.aliases
        }

        async fn execute(
            &self,
            _context: &ExecutionContext,
            _args: &Value,
        ) -> Result<ExecuteResult, ToolError> {
            Ok(ExecuteResult::completed(
                "stub".to_string(),
                0,
                String::new(),
                String::new(),
            ))
        }
    }

    #[test]
    fn test_register_name_and_aliases() {
        let registry = ToolRegistry::new();
        registry
            .register(StubTool::new("system.reset_network", &["system_reset_network"]))
            .unwrap();

        assert_eq!(registry.size(), 2);
        assert_eq!(registry.list().len(), 1);
        assert_eq!(
            registry.list_names(),
            vec!["system.reset_network", "system_reset_network"]
        );

        let by_name = registry.get("system.reset_network").unwrap();
        let by_alias = registry.get("system_reset_network").unwrap();
        assert!(Arc::ptr_eq(&by_name, &by_alias));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = ToolRegistry::new();
        registry.register(StubTool::new("a", &[])).unwrap();

        let err = registry.register(StubTool::new("a", &["fresh"])).unwrap_err();
        assert_eq!(err, RegistryError::NameConflict("a".to_string()));
        assert_eq!(registry.list_names(), vec!["a"]);
    }

    #[test]
    fn test_alias_conflicts_leave_registry_unchanged() {
        let registry = ToolRegistry::new();
        registry.register(StubTool::new("a", &["x"])).unwrap();
        let before = registry.list_names();

        // Alias collides with an existing alias
        let err = registry.register(StubTool::new("b", &["y", "x"])).unwrap_err();
        assert_eq!(err, RegistryError::AliasConflict("x".to_string()));

        // Alias collides with an existing name
        let err = registry.register(StubTool::new("c", &["a"])).unwrap_err();
        assert_eq!(err, RegistryError::AliasConflict("a".to_string()));

        // Name collides with an existing alias
        let err = registry.register(StubTool::new("x", &[])).unwrap_err();
        assert_eq!(err, RegistryError::NameConflict("x".to_string()));

        assert_eq!(registry.list_names(), before);
        assert_eq!(registry.size(), 2);
        assert!(!registry.contains("y"));
        assert!(!registry.contains("b"));
    }

    #[test]
    fn test_alias_duplicated_within_one_tool() {
        let registry = ToolRegistry::new();

        let err = registry.register(StubTool::new("d", &["z", "z"])).unwrap_err();
        assert_eq!(err, RegistryError::AliasConflict("z".to_string()));

        let err = registry.register(StubTool::new("e", &["e"])).unwrap_err();
        assert_eq!(err, RegistryError::AliasConflict("e".to_string()));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_tools_rejected() {
        let registry = ToolRegistry::new();

        assert_eq!(
            registry.register(StubTool::new("", &[])).unwrap_err(),
            RegistryError::EmptyName
        );

        let no_platforms: Arc<dyn Tool> = Arc::new(StubTool {
            name: "p".to_string(),
            aliases: Vec::new(),
            platforms: Vec::new(),
            schema: ParameterSchema::empty(),
        });
        assert_eq!(
            registry.register(no_platforms).unwrap_err(),
            RegistryError::NoPlatforms("p".to_string())
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_removes_single_key() {
        let registry = ToolRegistry::new();
        registry.register(StubTool::new("a", &["x", "y"])).unwrap();

        assert!(registry.unregister("a").is_some());
        assert!(registry.get("a").is_none());
        assert!(registry.get("x").is_some());
        assert!(registry.get("y").is_some());
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.list().len(), 1);

        assert!(registry.unregister("a").is_none());

        // The freed name can be reused while the old aliases remain
        registry.register(StubTool::new("a", &[])).unwrap();
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_clear() {
        let registry = ToolRegistry::new();
        registry.register(StubTool::new("a", &["b"])).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_list_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(StubTool::new("zeta", &[])).unwrap();
        registry.register(StubTool::new("alpha", &["omega"])).unwrap();

        let names: Vec<String> = registry.list().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_concurrent_conflicting_registrations() {
        let registry = Arc::new(ToolRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    // Every tool claims the shared alias; exactly one may win
                    let name = format!("tool.{}", i);
                    registry.register(StubTool::new(&name, &["shared"])).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookup_during_registration() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(StubTool::new("stable", &["stable_alias"])).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..100 {
                    let name = format!("dyn.{}", i);
                    let alias = format!("dyn_{}", i);
                    registry.register(StubTool::new(&name, &[alias.as_str()])).unwrap();
                }
            })
        };

        let reader = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..100 {
                    assert!(registry.get("stable").is_some());
                    // Keys always arrive in pairs
                    assert_eq!(registry.size() % 2, 0);
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(registry.size(), 202);
        assert_eq!(registry.list().len(), 101);
    }
}
