//! Plugins: tasks running alongside a scan
//!
//! Plugins are launched when the scan enters `preparing` and joined during
//! `cleanup`. Each one gets a [`FrameworkHandle`] and returns a JSON value
//! that ends up in the audit store.

mod progress;

pub use progress::ProgressLog;

use crate::audit::FrameworkHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Plugin failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
}

/// What a plugin run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResult {
    pub name: String,
    pub description: String,
    pub results: Value,
}

/// Passed to every plugin run
#[derive(Clone)]
pub struct PluginContext {
    pub handle: FrameworkHandle,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn info(&self) -> PluginInfo;

    async fn run(&self, ctx: PluginContext) -> Result<Value, PluginError>;
}

/// Instantiates a built-in plugin by name
pub fn builtin(name: &str) -> Option<Arc<dyn Plugin>> {
    match name {
        "progress_log" => Some(Arc::new(ProgressLog::default())),
        _ => None,
    }
}

/// Metadata for every built-in plugin
pub fn available() -> Vec<PluginInfo> {
    vec![ProgressLog::default().info()]
}

/// Launches plugins and collects their results
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    running: Vec<(PluginInfo, JoinHandle<Result<Value, PluginError>>)>,
    results: BTreeMap<String, PluginResult>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads built-in plugins by name; nothing is loaded on an unknown name
    pub fn load(&mut self, names: &[String]) -> Result<(), PluginError> {
        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            loaded.push(builtin(name).ok_or_else(|| PluginError::NotFound(name.clone()))?);
        }
        for plugin in loaded {
            self.register(plugin);
        }
        Ok(())
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let name = plugin.info().name;
        if self.plugins.iter().any(|p| p.info().name == name) {
            return;
        }
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    /// Spawns every loaded plugin
    pub fn run(&mut self, handle: &FrameworkHandle) {
        for plugin in &self.plugins {
            let info = plugin.info();
            tracing::debug!("Starting plugin {}", info.name);

            let plugin = plugin.clone();
            let ctx = PluginContext {
                handle: handle.clone(),
            };
            let task = tokio::spawn(async move { plugin.run(ctx).await });
            self.running.push((info, task));
        }
    }

    /// Waits for every launched plugin to finish
    ///
    /// Failed or panicked plugins are logged and leave no result.
    pub async fn block(&mut self) {
        for (info, task) in self.running.drain(..) {
            match task.await {
                Ok(Ok(results)) => {
                    self.results.insert(
                        info.name.clone(),
                        PluginResult {
                            name: info.name,
                            description: info.description,
                            results,
                        },
                    );
                }
                Ok(Err(e)) => tracing::warn!("Plugin {} failed: {}", info.name, e),
                Err(e) => tracing::warn!("Plugin {} aborted: {}", info.name, e),
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.iter().any(|(_, task)| !task.is_finished())
    }

    pub fn results(&self) -> &BTreeMap<String, PluginResult> {
        &self.results
    }

    /// Drops results and aborts anything still running
    pub fn reset(&mut self) {
        for (_, task) in self.running.drain(..) {
            task.abort();
        }
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_known_and_unknown() {
        let mut manager = PluginManager::new();
        assert!(matches!(
            manager.load(&["nope".to_string()]),
            Err(PluginError::NotFound(_))
        ));
        assert!(manager.is_empty());

        manager.load(&["progress_log".to_string()]).unwrap();
        manager.load(&["progress_log".to_string()]).unwrap();
        assert_eq!(manager.list().len(), 1);
    }

    #[tokio::test]
    async fn test_block_without_plugins() {
        let mut manager = PluginManager::new();
        manager.block().await;
        assert!(manager.results().is_empty());
        assert!(!manager.is_running());
    }
}
