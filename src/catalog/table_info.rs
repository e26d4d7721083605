//! Table information and metadata structures.

use crate::catalog::column_info::ColumnInfo;
use crate::error::{PlanError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(table_id: TableId, table_name: String, columns: Vec<ColumnInfo>) -> Result<Self> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.column_name.eq_ignore_ascii_case(&column.column_name))
            {
                return Err(PlanError::DuplicateColumn {
                    table: table_name,
                    column: column.column_name.clone(),
                });
            }
        }

        Ok(Self {
            table_id,
            table_name,
            columns,
        })
    }

    /// Find a column by name (case-insensitive)
    pub fn column(&self, column_name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(column_name))
    }
}
