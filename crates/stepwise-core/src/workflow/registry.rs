use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::workflow::invoker::Task;

/// Tasks addressable by id. Built once, then shared read-only.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, task: impl Task + 'static) -> Result<(), ConfigError> {
        self.register_arc(id, Arc::new(task))
    }

    pub fn register_arc(&mut self, id: &str, task: Arc<dyn Task>) -> Result<(), ConfigError> {
        if self.tasks.contains_key(id) {
            return Err(ConfigError::DuplicateTask(id.to_string()));
        }
        tracing::debug!("[Registry] Registered task '{}'", id);
        self.tasks.insert(id.to_string(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::FnTask;
    use serde_json::json;

    fn noop() -> FnTask {
        FnTask::new(|_input| async { Ok(json!({ "statusCode": 200 })) })
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TaskRegistry::new();
        registry.register("fetch", noop()).unwrap();
        registry.register("notify", noop()).unwrap();

        assert!(registry.contains("fetch"));
        assert!(registry.get("notify").is_some());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.ids(), vec!["fetch".to_string(), "notify".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register("fetch", noop()).unwrap();
        let err = registry.register("fetch", noop()).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateTask("fetch".to_string()));
    }
}
