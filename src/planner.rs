//! Filter placement over a distributed plan.
//!
//! The planner drives the two expression passes for a WHERE predicate at
//! a plan node:
//! 1. Name resolution binds every column against the tables below the node
//!    and infers result types bottom-up
//! 2. The reference pass decides, per conjunct, which plan node owns it
//!
//! The ownership map then yields an explain listing and the SQL each shard
//! table receives.

use crate::error::Result;
use crate::expression::{FunctionRegistry, Functype, Item, PlanResolver};
use crate::plan::{PlanNodeId, PlanTree, ReferContext};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// A top-level conjunct and the plan node it was placed at
#[derive(Debug, Clone)]
pub struct Placement {
    pub predicate: Item,
    pub owner: PlanNodeId,
}

/// Query sent to one shard table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardQuery {
    pub table: PlanNodeId,
    pub sql: String,
}

impl fmt::Display for ShardQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.sql)
    }
}

pub struct Planner {
    registry: Arc<FunctionRegistry>,
    push_down_restricted: bool,
}

impl Planner {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            push_down_restricted: false,
        }
    }

    /// Keep the arguments of multi-table expressions unresolved
    pub fn with_push_down_restricted(mut self, restricted: bool) -> Self {
        self.push_down_restricted = restricted;
        self
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Name-resolution pass over the tables visible from `scope`
    pub fn bind(&self, plan: &PlanTree, scope: PlanNodeId, predicate: Item) -> Result<Item> {
        let resolver = PlanResolver::new(plan, scope);
        let mut item = predicate.fix_fields_with(&resolver)?;
        item.fix_fields()?;
        Ok(item)
    }

    /// Reference pass for an already bound expression
    pub fn place(&self, plan: &mut PlanTree, at: PlanNodeId, item: &Item) {
        let mut ctx =
            ReferContext::new(plan, at).push_down_restricted(self.push_down_restricted);
        item.fix_refer(&mut ctx);
    }

    /// Bind and place every top-level conjunct of `predicate` at `at`.
    ///
    /// All conjuncts are bound before any is placed, so a binding failure
    /// leaves the ownership map untouched.
    pub fn plan_filter(
        &self,
        plan: &mut PlanTree,
        at: PlanNodeId,
        predicate: Item,
    ) -> Result<Vec<Placement>> {
        let bound_conjuncts = split_conjuncts(predicate)
            .into_iter()
            .map(|conjunct| self.bind(plan, at, conjunct))
            .collect::<Result<Vec<_>>>()?;

        let mut placements = Vec::with_capacity(bound_conjuncts.len());
        for bound in bound_conjuncts {
            self.place(plan, at, &bound);

            // Constants that record nothing stay where the filter was written
            let owner = plan.refered_map(at).owner_of(&bound).unwrap_or(at);
            debug!("filter {} placed at {}", bound, owner);
            placements.push(Placement {
                predicate: bound,
                owner,
            });
        }
        Ok(placements)
    }

    /// Human-readable ownership listing of the node `at`
    pub fn explain(&self, plan: &PlanTree, at: PlanNodeId, placements: &[Placement]) -> Vec<String> {
        let mut lines: Vec<String> = placements
            .iter()
            .map(|p| format!("filter {} -> {}", p.predicate, plan.describe(p.owner)))
            .collect();

        for (owner, items) in plan.refered_map(at).iter() {
            let rendered: Vec<String> = items.iter().map(Item::to_string).collect();
            lines.push(format!("{}: {}", plan.describe(owner), rendered.join(", ")));
        }
        lines
    }

    /// SQL for every table below `at`: the filters it owns become its WHERE
    /// clause, the other expressions it owns its select list.
    pub fn shard_sql(
        &self,
        plan: &PlanTree,
        at: PlanNodeId,
        placements: &[Placement],
    ) -> Result<Vec<ShardQuery>> {
        let refered = plan.refered_map(at);
        let mut queries = Vec::new();

        for table_id in plan.table_nodes_under(at) {
            let Some(table) = plan.table(table_id) else {
                continue;
            };

            let filters: Vec<&Item> = placements
                .iter()
                .filter(|p| p.owner == table_id)
                .map(|p| &p.predicate)
                .collect();
            let select_list = refered
                .owned_by(table_id)
                .iter()
                .filter(|item| !filters.contains(item))
                .map(|item| item.to_sql(&self.registry))
                .collect::<Result<Vec<_>>>()?;
            let conditions = filters
                .iter()
                .map(|item| item.to_sql(&self.registry))
                .collect::<Result<Vec<_>>>()?;

            let mut sql = format!(
                "SELECT {} FROM `{}`",
                if select_list.is_empty() {
                    "*".to_string()
                } else {
                    select_list.join(", ")
                },
                table.table.table_name
            );
            if let Some(alias) = &table.alias {
                sql.push_str(&format!(" AS `{}`", alias));
            }
            if !conditions.is_empty() {
                sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
            }
            queries.push(ShardQuery {
                table: table_id,
                sql,
            });
        }
        Ok(queries)
    }
}

/// Flatten nested AND nodes into their conjuncts, left to right
pub fn split_conjuncts(predicate: Item) -> Vec<Item> {
    match predicate {
        Item::Func(func) if func.functype() == Functype::CondAndFunc => func
            .into_arguments()
            .into_iter()
            .flat_map(split_conjuncts)
            .collect(),
        other => vec![other],
    }
}
