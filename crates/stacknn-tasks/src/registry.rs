//! Name tables for tasks, configuration presets and controllers
//!
//! Built once at start-up and queried by exact name. A miss is a
//! configuration error.

use stacknn_core::{Error, NetworkType, Result, StructType};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::config::{SequenceKind, TaskConfig};
use crate::sequence::SequenceTask;
use crate::Task;

/// Builds a task from a resolved configuration
pub type TaskConstructor = fn(TaskConfig) -> Result<Box<dyn Task>>;

fn reverse_task(config: TaskConfig) -> Result<Box<dyn Task>> {
    Ok(Box::new(SequenceTask::new(config.with_kind(SequenceKind::Reverse))?))
}

fn copy_task(config: TaskConfig) -> Result<Box<dyn Task>> {
    Ok(Box::new(SequenceTask::new(config.with_kind(SequenceKind::Copy))?))
}

/// Reversal on a stack
pub fn reverse_config() -> TaskConfig {
    TaskConfig::new()
        .with_kind(SequenceKind::Reverse)
        .with_struct_type(StructType::Stack)
        .with_max_length(12)
}

/// Copying on a queue
pub fn copy_config() -> TaskConfig {
    TaskConfig::new()
        .with_kind(SequenceKind::Copy)
        .with_struct_type(StructType::Queue)
        .with_max_length(12)
}

/// Reversal with simultaneous push and pop discouraged
pub fn reverse_reg_config() -> TaskConfig {
    reverse_config()
        .with_push_reg_weight(0.1)
        .with_pop_reg_weight(0.1)
}

#[derive(Debug, Clone)]
pub struct Registry {
    tasks: BTreeMap<&'static str, TaskConstructor>,
    configs: BTreeMap<&'static str, fn() -> TaskConfig>,
    controllers: BTreeMap<&'static str, NetworkType>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// Every task, preset and controller shipped with the workspace
    pub fn builtin() -> Self {
        let mut tasks: BTreeMap<&'static str, TaskConstructor> = BTreeMap::new();
        tasks.insert("ReverseTask", reverse_task);
        tasks.insert("CopyTask", copy_task);

        let mut configs: BTreeMap<&'static str, fn() -> TaskConfig> = BTreeMap::new();
        configs.insert("reverse_config", reverse_config);
        configs.insert("copy_config", copy_config);
        configs.insert("reverse_reg_config", reverse_reg_config);

        let mut controllers = BTreeMap::new();
        controllers.insert("LinearController", NetworkType::Linear);
        controllers.insert("LSTMController", NetworkType::Lstm);

        Self {
            tasks,
            configs,
            controllers,
        }
    }

    pub fn task(&self, name: &str) -> Result<TaskConstructor> {
        self.tasks
            .get(name)
            .copied()
            .ok_or_else(|| Error::Unregistered {
                kind: "task",
                name: name.to_string(),
            })
    }

    pub fn config(&self, name: &str) -> Result<TaskConfig> {
        self.configs
            .get(name)
            .map(|preset| preset())
            .ok_or_else(|| Error::Unregistered {
                kind: "configuration",
                name: name.to_string(),
            })
    }

    pub fn controller(&self, name: &str) -> Result<NetworkType> {
        self.controllers
            .get(name)
            .copied()
            .ok_or_else(|| Error::Unregistered {
                kind: "controller",
                name: name.to_string(),
            })
    }

    /// Preset by name, else a JSON file at that path, else the defaults
    /// when no name is given.
    pub fn resolve_config(&self, name: Option<&str>) -> Result<TaskConfig> {
        let Some(name) = name else {
            return Ok(TaskConfig::new());
        };
        if let Ok(config) = self.config(name) {
            return Ok(config);
        }
        let path = Path::new(name);
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            debug!(path = %path.display(), "loading configuration file");
            return TaskConfig::from_file(path);
        }
        self.config(name)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.keys().copied()
    }

    pub fn config_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.configs.keys().copied()
    }

    pub fn controller_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.controllers.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::config::Config;

    #[test]
    fn test_task_lookup() {
        let registry = Registry::builtin();
        let task = registry.task("CopyTask").unwrap()(TaskConfig::new()).unwrap();
        assert_eq!(task.name(), "CopyTask");
        assert_eq!(task.config().kind, SequenceKind::Copy);

        // The task name wins over the preset's kind.
        let task = registry.task("ReverseTask").unwrap()(copy_config()).unwrap();
        assert_eq!(task.config().kind, SequenceKind::Reverse);
        assert_eq!(task.config().struct_type, StructType::Queue);
    }

    #[test]
    fn test_lookup_misses_are_config_errors() {
        let registry = Registry::builtin();
        for err in [
            registry.task("reversetask").err(),
            registry.config("dyck_config").err(),
            registry.controller("BufferedController").err(),
        ] {
            let err = err.unwrap();
            assert!(err.is_config());
            assert!(matches!(err, Error::Unregistered { .. }));
        }
    }

    #[test]
    fn test_controller_names() {
        let registry = Registry::builtin();
        assert_eq!(registry.controller("LSTMController").unwrap(), NetworkType::Lstm);
        assert_eq!(
            registry.controller_names().collect::<Vec<_>>(),
            vec!["LSTMController", "LinearController"]
        );
    }

    #[test]
    fn test_presets() {
        let config = reverse_reg_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.push_reg_weight, 0.1);
        assert_eq!(copy_config().struct_type, StructType::Queue);
        assert_eq!(Registry::builtin().config_names().count(), 3);
    }

    #[test]
    fn test_resolve_config() {
        let registry = Registry::builtin();
        assert_eq!(registry.resolve_config(None).unwrap().max_length, 12);
        assert_eq!(
            registry.resolve_config(Some("copy_config")).unwrap().kind,
            SequenceKind::Copy
        );
        assert!(registry.resolve_config(Some("missing.json")).is_err());

        let path = std::env::temp_dir()
            .join(format!("stacknn-preset-{}.json", uuid::Uuid::new_v4()));
        reverse_reg_config().with_epochs(3).save(&path).unwrap();
        let loaded = registry
            .resolve_config(Some(path.to_str().unwrap()))
            .unwrap();
        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.pop_reg_weight, 0.1);
        std::fs::remove_file(&path).unwrap();
    }
}
