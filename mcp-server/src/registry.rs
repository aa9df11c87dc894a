//! Closed tool registry
//!
//! Maps each tool name to its definition, compiled input schema and the
//! adapter that executes it. Built once at startup; a bad schema or a
//! duplicate name fails the build instead of surfacing per request.

use crate::adapter::ToolAdapter;
use buildgate_protocol::{ArgumentSchema, Tool, Validator};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid tool name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid input schema for tool '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// A registered tool
pub struct ToolEntry {
    pub definition: Tool,
    pub schema: ArgumentSchema,
    pub adapter: Arc<dyn ToolAdapter>,
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Immutable name -> tool mapping
#[derive(Debug)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
    /// Catalog in registration order, as served by `tools/list`
    catalog: Vec<Tool>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn tools(&self) -> &[Tool] {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

/// Collects tool definitions; validation happens in [`build`](Self::build)
#[derive(Default)]
pub struct ToolRegistryBuilder {
    pending: Vec<(Tool, Arc<dyn ToolAdapter>)>,
}

impl ToolRegistryBuilder {
    /// Register every tool an adapter publishes
    pub fn adapter(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        for tool in adapter.tools() {
            self.pending.push((tool, adapter.clone()));
        }
        self
    }

    /// Register a single tool served by `adapter`
    pub fn tool(mut self, definition: Tool, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.pending.push((definition, adapter));
        self
    }

    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut entries = HashMap::with_capacity(self.pending.len());
        let mut catalog = Vec::with_capacity(self.pending.len());

        for (definition, adapter) in self.pending {
            let name = definition.name.clone();

            Validator::validate_tool_name(&name).map_err(|e| RegistryError::InvalidName {
                name: name.clone(),
                reason: e.message,
            })?;

            if entries.contains_key(&name) {
                return Err(RegistryError::DuplicateTool(name));
            }

            let schema = ArgumentSchema::compile(&definition.input_schema).map_err(|e| {
                RegistryError::InvalidSchema {
                    name: name.clone(),
                    reason: e.message,
                }
            })?;

            debug!(tool = %name, "Registered tool");
            catalog.push(definition.clone());
            entries.insert(
                name,
                ToolEntry {
                    definition,
                    schema,
                    adapter,
                },
            );
        }

        Ok(ToolRegistry { entries, catalog })
    }
}
