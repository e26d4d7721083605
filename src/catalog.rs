//! In-memory catalog consulted while binding column references.
//!
//! The planner never reads table data; it only needs the shape of each
//! table (column names, types, display lengths and nullability) so that
//! bound columns carry the metadata type inference starts from.

pub mod column_info;
pub mod table_info;

pub use column_info::ColumnInfo;
pub use table_info::{TableId, TableInfo};

use crate::error::{PlanError, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, Arc<TableInfo>>,
    next_table_id: u32,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table. Names are case-insensitive.
    pub fn create_table(
        &mut self,
        table_name: impl Into<String>,
        columns: Vec<ColumnInfo>,
    ) -> Result<Arc<TableInfo>> {
        let table_name = table_name.into();
        let key = table_name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(PlanError::DuplicateTable(table_name));
        }

        self.next_table_id += 1;
        let info = Arc::new(TableInfo::new(
            TableId(self.next_table_id),
            table_name,
            columns,
        )?);
        self.tables.insert(key, Arc::clone(&info));
        Ok(info)
    }

    pub fn get_table(&self, table_name: &str) -> Result<Arc<TableInfo>> {
        self.tables
            .get(&table_name.to_lowercase())
            .cloned()
            .ok_or_else(|| PlanError::UnknownTable(table_name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .tables
            .values()
            .map(|t| t.table_name.clone())
            .collect();
        names.sort();
        names
    }
}
