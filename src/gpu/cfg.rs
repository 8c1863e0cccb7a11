//! Authoring formats for layouts and heaps, loadable from YAML or JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{BindingSlot, HeapInfo, ResourceSetLayout, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSetLayoutCfg {
    pub debug_name: String,
    #[serde(default)]
    pub slots: Vec<BindingSlot>,
}

impl ResourceSetLayoutCfg {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn vec_from_yaml(s: &str) -> Result<Vec<Self>> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn build(&self) -> Result<Arc<ResourceSetLayout>> {
        ResourceSetLayout::new(&self.debug_name, &self.slots)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapCfg {
    pub debug_name: String,
    pub byte_size: u32,
    #[serde(default = "default_max_allocations")]
    pub max_allocations: u32,
}

fn default_max_allocations() -> u32 {
    HeapInfo::default().max_allocations
}

impl HeapCfg {
    pub fn from_yaml(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn info(&self) -> HeapInfo<'_> {
        HeapInfo {
            debug_name: &self.debug_name,
            byte_size: self.byte_size,
            max_allocations: self.max_allocations,
        }
    }
}

impl ResourceSetLayout {
    pub fn from_yaml(yaml: &str) -> Result<Arc<Self>> {
        ResourceSetLayoutCfg::from_yaml(yaml)?.build()
    }
}
