//! The tool catalog advertised to the model.

use crate::messages::ToolDefinition;
use crate::tools::definition::ParamSpec;
use crate::tools::schema::input_schema;
use serde::{Deserialize, Serialize};

/// One advertised tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Declared parameters
    pub params: Vec<ParamSpec>,
}

impl CatalogEntry {
    /// Converts the entry into a structured-call tool definition.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: input_schema(&self.params),
        }
    }
}

/// Names, descriptions and parameter schemas of every registered tool,
/// sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
}

impl ToolCatalog {
    /// Creates a catalog from entries, sorting them by name.
    #[must_use]
    pub fn new(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    /// The advertised tools.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Looks up an entry by tool name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Structured-call definitions for every tool.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(CatalogEntry::definition).collect()
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no tools are advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
