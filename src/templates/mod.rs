//! Reusable command callbacks, looked up by name from command definitions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::Callback;

pub mod builtin;

#[derive(Default, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<dyn Callback>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every built-in template.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Registers `callback` under `name`, replacing any previous template.
    pub fn register(&mut self, name: impl Into<String>, callback: Arc<dyn Callback>) {
        self.templates.insert(name.into(), callback);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Callback>> {
        self.templates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("templates", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Invocation;
    use crate::context::ExecutionContext;
    use crate::message::Reply;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl Callback for Silent {
        async fn call(
            &self,
            _: &Invocation<'_>,
            _: &ExecutionContext,
        ) -> anyhow::Result<Option<Reply>> {
            Ok(None)
        }
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = TemplateRegistry::with_builtins();
        for name in [
            "random_text",
            "random_file",
            "static_reply",
            "help_text",
            "list_commands",
            "note",
            "play_youtube",
            "play_radio",
        ] {
            assert!(registry.contains(name), "missing template {}", name);
        }
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = TemplateRegistry::with_builtins();
        let before = registry.names().len();
        registry.register("note", Arc::new(Silent));
        assert_eq!(registry.names().len(), before);
        assert!(registry.get("note").is_some());
        assert!(registry.get("missing").is_none());
    }
}
