//! Expression ownership bookkeeping for the reference pass.

use crate::expression::Item;
use crate::plan::{PlanNodeId, PlanTree};
use log::trace;
use std::collections::HashMap;

/// Expressions seen at a plan node, grouped by the node that owns them.
///
/// Expressions are deduplicated with `Item` equality, so two predicates
/// with the same rendered label are recorded once.
#[derive(Debug, Clone, Default)]
pub struct ReferedMap {
    entries: Vec<(PlanNodeId, Vec<Item>)>,
    /// Owner of every recorded expression
    index: HashMap<Item, PlanNodeId>,
}

impl ReferedMap {
    /// Record `item` under `owner`. Returns false if it was already recorded.
    pub fn add(&mut self, owner: PlanNodeId, item: Item) -> bool {
        if self.index.contains_key(&item) {
            return false;
        }
        self.index.insert(item.clone(), owner);
        match self.entries.iter_mut().find(|(id, _)| *id == owner) {
            Some((_, items)) => items.push(item),
            None => self.entries.push((owner, vec![item])),
        }
        true
    }

    pub fn owner_of(&self, item: &Item) -> Option<PlanNodeId> {
        self.index.get(item).copied()
    }

    pub fn owned_by(&self, owner: PlanNodeId) -> &[Item] {
        self.entries
            .iter()
            .find(|(id, _)| *id == owner)
            .map(|(_, items)| items.as_slice())
            .unwrap_or(&[])
    }

    /// Owners in first-recorded order with their expressions
    pub fn iter(&self) -> impl Iterator<Item = (PlanNodeId, &[Item])> {
        self.entries
            .iter()
            .map(|(owner, items)| (*owner, items.as_slice()))
    }

    /// Number of recorded expressions
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// State of one reference pass: the plan node being processed and whether
/// push-down below it is restricted.
pub struct ReferContext<'a> {
    plan: &'a mut PlanTree,
    node: PlanNodeId,
    push_down_restricted: bool,
}

impl<'a> ReferContext<'a> {
    pub fn new(plan: &'a mut PlanTree, node: PlanNodeId) -> Self {
        Self {
            plan,
            node,
            push_down_restricted: false,
        }
    }

    pub fn push_down_restricted(mut self, restricted: bool) -> Self {
        self.push_down_restricted = restricted;
        self
    }

    pub fn plan_node(&self) -> PlanNodeId {
        self.node
    }

    pub fn plan(&self) -> &PlanTree {
        self.plan
    }

    /// True when arguments of a multi-table expression must not be
    /// resolved individually
    pub fn is_push_down_node(&self) -> bool {
        self.push_down_restricted
    }

    /// Record at the current plan node that `item` is owned by `owner`
    pub fn add_sel_to_refered_map(&mut self, owner: PlanNodeId, item: &Item) {
        trace!("{}: {} -> {}", self.node, item, owner);
        self.plan.add_sel_to_refered_map(self.node, owner, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::types::FieldType;

    fn field(table: usize) -> Item {
        Item::field(
            PlanNodeId(table),
            format!("t{}", table),
            ColumnInfo::new("a", FieldType::Long),
        )
    }

    #[test]
    fn test_refered_map_dedup() {
        let mut map = ReferedMap::default();
        assert!(map.add(PlanNodeId(1), field(1)));
        assert!(map.add(PlanNodeId(2), field(2)));
        assert!(!map.add(PlanNodeId(3), field(1)));

        assert_eq!(map.len(), 2);
        assert_eq!(map.owner_of(&field(1)), Some(PlanNodeId(1)));
        assert_eq!(map.owned_by(PlanNodeId(2)), &[field(2)]);
        assert!(map.owned_by(PlanNodeId(3)).is_empty());

        let owners: Vec<_> = map.iter().map(|(owner, _)| owner).collect();
        assert_eq!(owners, vec![PlanNodeId(1), PlanNodeId(2)]);

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_refered_map_same_label_different_tables() {
        // Same rendered label, bound to two different table nodes
        let left = Item::field(PlanNodeId(1), "t", ColumnInfo::new("a", FieldType::Long));
        let right = Item::field(PlanNodeId(2), "t", ColumnInfo::new("a", FieldType::Long));
        assert_eq!(left.to_string(), right.to_string());

        let mut map = ReferedMap::default();
        assert!(map.add(PlanNodeId(1), left.clone()));
        assert!(map.add(PlanNodeId(2), right.clone()));
        assert!(!map.add(PlanNodeId(2), left.clone()));

        assert_eq!(map.len(), 2);
        assert_eq!(map.owner_of(&left), Some(PlanNodeId(1)));
        assert_eq!(map.owner_of(&right), Some(PlanNodeId(2)));

        map.clear();
        assert_eq!(map.owner_of(&left), None);
        assert!(map.add(PlanNodeId(3), left));
    }

    #[test]
    fn test_context_records_at_current_node() {
        let mut tree = PlanTree::new();
        let node = tree.add_no_name();
        let mut ctx = ReferContext::new(&mut tree, node).push_down_restricted(true);
        assert!(ctx.is_push_down_node());
        assert_eq!(ctx.plan_node(), node);

        ctx.add_sel_to_refered_map(PlanNodeId(7), &Item::int(1));
        assert_eq!(
            tree.refered_map(node).owner_of(&Item::int(1)),
            Some(PlanNodeId(7))
        );
    }
}
