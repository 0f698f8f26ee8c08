//! Migration plan management
//!
//! A plan lists the tables to copy, in the order they must be copied
//! (tables other tables reference come first), together with the key column
//! of each table and the page/batch sizes used while copying.
//!
//! Example format:
//! ```yaml
//! tables:
//!   - eventos_movimentacao
//!   - respostas_gestor
//!   - candidatos
//! default_key: id
//! keys:
//!   eventos_movimentacao: id_evento
//!   respostas_gestor: id_resposta
//! page_size: 1000
//! batch_size: 100
//! progress_every: 500
//! ```

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_KEY: &str = "id";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PROGRESS_EVERY: usize = 500;

/// Default PostgREST `max-rows` on hosted Supabase; larger pages come back
/// truncated and look like the last page
pub const SERVER_MAX_ROWS: usize = 1000;

/// Whether `name` can be used as a single `/rest/v1/{name}` path segment
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
}

/// A table and the column used both to order pages and to resolve upserts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub key: String,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (key: {})", self.name, self.key)
    }
}

/// Ordered list of tables to migrate plus per-table key overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MigrationPlan {
    /// Tables in migration order
    pub tables: Vec<String>,
    /// Key column for tables without an override
    pub default_key: String,
    /// Table name -> key column
    pub keys: BTreeMap<String, String>,
    /// Rows requested per page from the source
    pub page_size: usize,
    /// Rows sent per upsert request to the destination
    pub batch_size: usize,
    /// Log loader progress each time this many rows have been written
    pub progress_every: usize,
}

impl MigrationPlan {
    /// Create a plan for `tables` with default sizes and no key overrides
    pub fn new(tables: Vec<String>) -> Self {
        Self {
            tables,
            default_key: DEFAULT_KEY.to_string(),
            keys: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    /// Override the key column of `table`
    pub fn with_key(mut self, table: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(table.into(), key.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Key column for `table`, falling back to `default_key`
    pub fn key_for(&self, table: &str) -> &str {
        self.keys
            .get(table)
            .map(|k| k.as_str())
            .unwrap_or(self.default_key.as_str())
    }

    /// Resolve every table into a descriptor, in plan order
    pub fn descriptors(&self) -> Vec<TableDescriptor> {
        self.tables
            .iter()
            .map(|t| TableDescriptor::new(t.as_str(), self.key_for(t)))
            .collect()
    }

    /// Get the number of tables in the plan
    pub fn count(&self) -> usize {
        self.tables.len()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Restrict the plan to `only`, keeping plan order
    ///
    /// An empty selection keeps every table.
    ///
    /// # Errors
    /// Returns an error naming any selected table that is not in the plan
    pub fn select(mut self, only: &[String]) -> Result<Self> {
        if only.is_empty() {
            return Ok(self);
        }

        let unknown: Vec<&str> = only
            .iter()
            .filter(|t| !self.contains(t))
            .map(|t| t.as_str())
            .collect();
        if !unknown.is_empty() {
            eyre::bail!(
                "Table(s) not in migration plan: {}. Planned tables: {}",
                unknown.join(", "),
                self.tables.join(", ")
            );
        }

        self.tables.retain(|t| only.contains(t));
        Ok(self)
    }

    /// Check the plan can drive a migration
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            eyre::bail!("Migration plan has no tables");
        }
        if self.page_size == 0 {
            eyre::bail!("page_size must be greater than zero");
        }
        if self.page_size > SERVER_MAX_ROWS {
            log::warn!(
                "page_size {} is above the server's default max-rows ({}); \
                 tables may be cut short at the first page",
                self.page_size,
                SERVER_MAX_ROWS
            );
        }
        if self.batch_size == 0 {
            eyre::bail!("batch_size must be greater than zero");
        }
        if self.progress_every == 0 {
            eyre::bail!("progress_every must be greater than zero");
        }
        if self.default_key.trim().is_empty() {
            eyre::bail!("default_key must not be empty");
        }

        let mut seen = HashSet::new();
        for table in &self.tables {
            if !is_valid_table_name(table) {
                eyre::bail!(
                    "Invalid table name '{}': only letters, digits, '_', '-' and '$' are allowed",
                    table
                );
            }
            if !seen.insert(table.as_str()) {
                eyre::bail!("Table '{}' is listed more than once", table);
            }
        }

        for (table, key) in &self.keys {
            if key.trim().is_empty() {
                eyre::bail!("Key column for '{}' must not be empty", table);
            }
            if !self.contains(table) {
                log::warn!("Key override for '{}' does not match any planned table", table);
            }
        }

        Ok(())
    }

    /// Read plan from YAML file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read migration plan: {}", path.as_ref().display())
        })?;

        let plan: Self = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse migration plan YAML")?;

        Ok(plan)
    }

    /// Write plan to YAML file
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)
            .with_context(|| "Failed to serialize migration plan to YAML")?;

        std::fs::write(path.as_ref(), yaml).with_context(|| {
            format!("Failed to write migration plan: {}", path.as_ref().display())
        })?;

        Ok(())
    }
}

impl Default for MigrationPlan {
    /// The recruiting schema: movement events and manager answers first,
    /// then the vacancy link tables, then candidates.
    fn default() -> Self {
        Self::new(vec![
            "eventos_movimentacao".to_string(),
            "respostas_gestor".to_string(),
            "substitutos_vaga".to_string(),
            "vagas_analista".to_string(),
            "candidatos".to_string(),
        ])
        .with_key("eventos_movimentacao", "id_evento")
        .with_key("respostas_gestor", "id_resposta")
    }
}
