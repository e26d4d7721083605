//! Column name resolution.

use crate::error::{PlanError, Result};
use crate::expression::item::{ColumnRef, Item};
use crate::plan::{PlanNodeId, PlanTree};
use log::trace;

/// Binds column references while the name-resolution pass runs
pub trait NameResolutionContext {
    /// Return the bound node replacing `column`
    fn resolve(&self, column: &ColumnRef) -> Result<Item>;
}

/// Resolves names against the table leaves below one plan node.
///
/// Qualified references must match exactly one visible table name (alias
/// if one is given). Unqualified references must match exactly one table.
pub struct PlanResolver<'a> {
    plan: &'a PlanTree,
    scope: PlanNodeId,
}

impl<'a> PlanResolver<'a> {
    pub fn new(plan: &'a PlanTree, scope: PlanNodeId) -> Self {
        Self { plan, scope }
    }
}

impl NameResolutionContext for PlanResolver<'_> {
    fn resolve(&self, column: &ColumnRef) -> Result<Item> {
        let tables = self.plan.table_nodes_under(self.scope);

        let candidates: Vec<PlanNodeId> = match &column.table {
            Some(qualifier) => {
                let named: Vec<PlanNodeId> = tables
                    .into_iter()
                    .filter(|id| {
                        self.plan
                            .table(*id)
                            .map_or(false, |t| t.visible_name().eq_ignore_ascii_case(qualifier))
                    })
                    .collect();
                match named.len() {
                    0 => return Err(PlanError::UnknownTable(qualifier.clone())),
                    1 => named,
                    _ => return Err(PlanError::NonUniqueTable(qualifier.clone())),
                }
            }
            None => tables,
        };

        let mut matches = candidates.into_iter().filter_map(|id| {
            let table = self.plan.table(id)?;
            table
                .table
                .column(&column.column)
                .map(|info| (id, table.visible_name().to_string(), info.clone()))
        });

        match (matches.next(), matches.next()) {
            (Some((id, table_name, info)), None) => {
                trace!("{} bound to {}", column, id);
                Ok(Item::field(id, table_name, info))
            }
            (None, _) => Err(PlanError::UnknownColumn(column.to_string())),
            (Some(_), Some(_)) => Err(PlanError::AmbiguousColumn(column.to_string())),
        }
    }
}
