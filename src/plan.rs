//! Distributed plan tree.
//!
//! Plan nodes live in an arena (`PlanTree`) and refer to each other by
//! `PlanNodeId`. Leaves are shard tables; inner nodes are joins or query
//! nodes (filters, aggregation and projection over a single child). Each
//! node carries an expression-ownership map filled by the reference pass.

pub mod refer;

pub use refer::{ReferContext, ReferedMap};

use crate::catalog::TableInfo;
use crate::error::{PlanError, Result};
use crate::expression::Item;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(pub usize);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanNodeType {
    Table,
    Join,
    Query,
    /// Query without FROM
    NoName,
}

/// Join types. Right joins are stored as left joins with swapped children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
}

#[derive(Debug, Clone)]
pub struct TableNode {
    pub table: Arc<TableInfo>,
    pub alias: Option<String>,
}

impl TableNode {
    /// Name the table is visible under in its query block
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.table_name)
    }
}

#[derive(Debug, Clone)]
pub struct JoinNode {
    pub left: PlanNodeId,
    pub right: PlanNodeId,
    pub join_type: JoinType,
}

impl JoinNode {
    pub fn is_left_outer_join(&self) -> bool {
        self.join_type == JoinType::LeftOuter
    }

    pub fn left_node(&self) -> PlanNodeId {
        self.left
    }

    pub fn right_node(&self) -> PlanNodeId {
        self.right
    }
}

#[derive(Debug, Clone)]
pub enum PlanNodeKind {
    Table(TableNode),
    Join(JoinNode),
    Query { child: PlanNodeId },
    NoName,
}

#[derive(Debug, Clone)]
pub struct PlanNode {
    pub kind: PlanNodeKind,
    refered: ReferedMap,
}

impl PlanNode {
    fn new(kind: PlanNodeKind) -> Self {
        Self {
            kind,
            refered: ReferedMap::default(),
        }
    }

    pub fn node_type(&self) -> PlanNodeType {
        match self.kind {
            PlanNodeKind::Table(_) => PlanNodeType::Table,
            PlanNodeKind::Join(_) => PlanNodeType::Join,
            PlanNodeKind::Query { .. } => PlanNodeType::Query,
            PlanNodeKind::NoName => PlanNodeType::NoName,
        }
    }

    pub fn refered_map(&self) -> &ReferedMap {
        &self.refered
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanTree {
    nodes: Vec<PlanNode>,
}

impl PlanTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: Arc<TableInfo>, alias: Option<String>) -> PlanNodeId {
        self.push(PlanNodeKind::Table(TableNode { table, alias }))
    }

    pub fn add_join(
        &mut self,
        left: PlanNodeId,
        right: PlanNodeId,
        join_type: JoinType,
    ) -> Result<PlanNodeId> {
        self.check(left)?;
        self.check(right)?;
        if left == right {
            return Err(PlanError::InvalidPlanNode(format!(
                "join of {} with itself",
                left
            )));
        }
        Ok(self.push(PlanNodeKind::Join(JoinNode {
            left,
            right,
            join_type,
        })))
    }

    /// `left RIGHT JOIN right`, normalised to `right LEFT JOIN left`
    pub fn add_right_join(&mut self, left: PlanNodeId, right: PlanNodeId) -> Result<PlanNodeId> {
        self.add_join(right, left, JoinType::LeftOuter)
    }

    pub fn add_query(&mut self, child: PlanNodeId) -> Result<PlanNodeId> {
        self.check(child)?;
        Ok(self.push(PlanNodeKind::Query { child }))
    }

    pub fn add_no_name(&mut self) -> PlanNodeId {
        self.push(PlanNodeKind::NoName)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: PlanNodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    pub fn node_type(&self, id: PlanNodeId) -> PlanNodeType {
        self.node(id).node_type()
    }

    pub fn table(&self, id: PlanNodeId) -> Option<&TableNode> {
        match &self.node(id).kind {
            PlanNodeKind::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn join(&self, id: PlanNodeId) -> Option<&JoinNode> {
        match &self.node(id).kind {
            PlanNodeKind::Join(join) => Some(join),
            _ => None,
        }
    }

    pub fn children(&self, id: PlanNodeId) -> Vec<PlanNodeId> {
        match &self.node(id).kind {
            PlanNodeKind::Table(_) | PlanNodeKind::NoName => vec![],
            PlanNodeKind::Join(join) => vec![join.left, join.right],
            PlanNodeKind::Query { child } => vec![*child],
        }
    }

    /// First child, if any
    pub fn child(&self, id: PlanNodeId) -> Option<PlanNodeId> {
        self.children(id).first().copied()
    }

    /// Table leaves below (or at) `id`, left to right
    pub fn table_nodes_under(&self, id: PlanNodeId) -> Vec<PlanNodeId> {
        let mut tables = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.table(current).is_some() {
                tables.push(current);
            }
            // Push in reverse so the left child is visited first
            stack.extend(self.children(current).into_iter().rev());
        }
        tables
    }

    /// Record that `item`, seen at plan node `at`, is owned by `owner`
    pub fn add_sel_to_refered_map(&mut self, at: PlanNodeId, owner: PlanNodeId, item: &Item) {
        self.nodes[at.0].refered.add(owner, item.clone());
    }

    pub fn refered_map(&self, at: PlanNodeId) -> &ReferedMap {
        self.node(at).refered_map()
    }

    pub fn clear_refered_maps(&mut self) {
        for node in &mut self.nodes {
            node.refered.clear();
        }
    }

    /// Short human-readable label used by explain output
    pub fn describe(&self, id: PlanNodeId) -> String {
        match &self.node(id).kind {
            PlanNodeKind::Table(table) => match &table.alias {
                Some(alias) => format!("{} table {} AS {}", id, table.table.table_name, alias),
                None => format!("{} table {}", id, table.table.table_name),
            },
            PlanNodeKind::Join(join) => {
                let kind = match join.join_type {
                    JoinType::Inner => "inner join",
                    JoinType::LeftOuter => "left join",
                };
                format!("{} {} ({}, {})", id, kind, join.left, join.right)
            }
            PlanNodeKind::Query { child } => format!("{} query ({})", id, child),
            PlanNodeKind::NoName => format!("{} no-name query", id),
        }
    }

    fn push(&mut self, kind: PlanNodeKind) -> PlanNodeId {
        self.nodes.push(PlanNode::new(kind));
        PlanNodeId(self.nodes.len() - 1)
    }

    fn check(&self, id: PlanNodeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(PlanError::InvalidPlanNode(format!("no plan node {}", id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, TableId};
    use crate::types::FieldType;

    fn table(name: &str) -> Arc<TableInfo> {
        Arc::new(
            TableInfo::new(
                TableId(1),
                name.to_string(),
                vec![ColumnInfo::new("id", FieldType::Long)],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_join_node() {
        let mut tree = PlanTree::new();
        let users = tree.add_table(table("users"), Some("u".to_string()));
        let orders = tree.add_table(table("orders"), None);
        let join = tree.add_join(users, orders, JoinType::LeftOuter).unwrap();

        assert_eq!(tree.node_type(join), PlanNodeType::Join);
        let jn = tree.join(join).unwrap();
        assert!(jn.is_left_outer_join());
        assert_eq!(jn.left_node(), users);
        assert_eq!(jn.right_node(), orders);
        assert_eq!(tree.child(join), Some(users));
        assert_eq!(tree.table(users).unwrap().visible_name(), "u");
        assert_eq!(tree.table(orders).unwrap().visible_name(), "orders");
    }

    #[test]
    fn test_right_join_is_normalised() {
        let mut tree = PlanTree::new();
        let a = tree.add_table(table("a"), None);
        let b = tree.add_table(table("b"), None);
        let join = tree.add_right_join(a, b).unwrap();

        let jn = tree.join(join).unwrap();
        assert!(jn.is_left_outer_join());
        assert_eq!(jn.left, b);
        assert_eq!(jn.right, a);
    }

    #[test]
    fn test_invalid_nodes_rejected() {
        let mut tree = PlanTree::new();
        let a = tree.add_table(table("a"), None);
        assert!(matches!(
            tree.add_join(a, PlanNodeId(9), JoinType::Inner),
            Err(PlanError::InvalidPlanNode(_))
        ));
        assert!(matches!(
            tree.add_join(a, a, JoinType::Inner),
            Err(PlanError::InvalidPlanNode(_))
        ));
        assert!(tree.add_query(PlanNodeId(3)).is_err());
    }

    #[test]
    fn test_table_nodes_under() {
        let mut tree = PlanTree::new();
        let a = tree.add_table(table("a"), None);
        let b = tree.add_table(table("b"), None);
        let c = tree.add_table(table("c"), None);
        let ab = tree.add_join(a, b, JoinType::Inner).unwrap();
        let abc = tree.add_join(ab, c, JoinType::LeftOuter).unwrap();
        let query = tree.add_query(abc).unwrap();

        assert_eq!(tree.table_nodes_under(query), vec![a, b, c]);
        assert_eq!(tree.table_nodes_under(b), vec![b]);
        assert_eq!(tree.children(query), vec![abc]);

        let empty = tree.add_no_name();
        assert!(tree.table_nodes_under(empty).is_empty());
        assert_eq!(tree.child(empty), None);
    }
}
