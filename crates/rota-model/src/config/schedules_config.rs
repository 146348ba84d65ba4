use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ModelError, TaskConfig, TaskDescriptor};

/// All schedules of one application, keyed by task name.
///
/// ```json
/// {
///   "appName": "billing",
///   "schedules": {
///     "invoice": { "type": 2, "spec": "@every 30s", "compete": true, "autoUnlock": true }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulesConfig {
    pub app_name: String,
    pub schedules: BTreeMap<String, TaskConfig>,
}

impl SchedulesConfig {
    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.schedules.get(name)
    }

    /// Validated descriptor for a single configured task.
    pub fn descriptor(&self, name: &str) -> Result<TaskDescriptor, ModelError> {
        let cfg = self
            .task(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownTask(name.to_string()))?;
        cfg.into_descriptor(name, &self.app_name)
    }

    /// Validated descriptors for every configured task, ordered by name.
    ///
    /// Fails on the first invalid entry.
    pub fn descriptors(&self) -> Result<Vec<TaskDescriptor>, ModelError> {
        self.schedules
            .iter()
            .map(|(name, cfg)| cfg.clone().into_descriptor(name.as_str(), &self.app_name))
            .collect()
    }
}
