//! Expression tree nodes.
//!
//! An `Item` is a strict tree: function nodes own their arguments, nothing
//! is shared and nothing points back up. Binding replaces a node by value,
//! so a parent always stores whatever its child's fix-up returned.

use crate::catalog::ColumnInfo;
use crate::error::{PlanError, Result};
use crate::expression::builtin::BuiltinFunc;
use crate::expression::function::FunctionNode;
use crate::expression::functype::Functype;
use crate::expression::registry::FunctionRegistry;
use crate::expression::resolver::NameResolutionContext;
use crate::plan::{PlanNodeId, ReferContext};
use crate::types::{Decimals, FieldType, ItemResult, Value, DECIMAL_MAX_PRECISION};
use log::warn;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::BitOr;

/// Plan nodes whose rows an expression depends on
pub type ReferTables = BTreeSet<PlanNodeId>;

/// Facts about a subtree, combined bottom-up by boolean OR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFacts {
    pub has_aggregate: bool,
    pub has_is_null: bool,
    pub has_subquery: bool,
    /// Non-deterministic value (RAND(), NOW(), variables)
    pub has_volatile: bool,
}

impl ExprFacts {
    pub const NONE: ExprFacts = ExprFacts {
        has_aggregate: false,
        has_is_null: false,
        has_subquery: false,
        has_volatile: false,
    };

    pub fn union(self, other: ExprFacts) -> ExprFacts {
        ExprFacts {
            has_aggregate: self.has_aggregate || other.has_aggregate,
            has_is_null: self.has_is_null || other.has_is_null,
            has_subquery: self.has_subquery || other.has_subquery,
            has_volatile: self.has_volatile || other.has_volatile,
        }
    }
}

impl BitOr for ExprFacts {
    type Output = ExprFacts;

    fn bitor(self, rhs: ExprFacts) -> ExprFacts {
        self.union(rhs)
    }
}

/// Result metadata of a node. Only trusted once `fixed` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMeta {
    pub fixed: bool,
    pub maybe_null: bool,
    /// Cached "evaluates to NULL" state
    pub null_value: bool,
    pub max_length: u32,
    pub decimals: Decimals,
    pub field_type: FieldType,
}

const UNBOUND_META: ItemMeta = ItemMeta {
    fixed: false,
    maybe_null: true,
    null_value: false,
    max_length: 0,
    decimals: Decimals::NotFixed,
    field_type: FieldType::Null,
};

impl ItemMeta {
    pub fn unfixed() -> Self {
        Self {
            fixed: false,
            maybe_null: false,
            null_value: false,
            max_length: 0,
            decimals: Decimals::Fixed(0),
            field_type: FieldType::Null,
        }
    }

    pub fn result_type(&self) -> ItemResult {
        self.field_type.result_type()
    }

    pub fn decimal_precision(&self) -> u32 {
        self.max_length.min(DECIMAL_MAX_PRECISION)
    }

    /// Digits before the decimal point when viewed as a fixed-point value
    pub fn decimal_int_part(&self) -> u32 {
        self.decimal_precision()
            .saturating_sub(self.decimals.fixed_point_scale())
    }
}

impl Default for ItemMeta {
    fn default() -> Self {
        Self::unfixed()
    }
}

/// Column reference as written in the query, not yet bound
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Parse `col` or `table.col`
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((table, column)) => Self::qualified(table, column),
            None => Self::new(text),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "`{}`.`{}`", table, self.column),
            None => write!(f, "`{}`", self.column),
        }
    }
}

/// Column bound to a table leaf of the plan
#[derive(Debug, Clone)]
pub struct FieldItem {
    pub table_node: PlanNodeId,
    /// Name the table is visible under (alias or table name)
    pub table_name: String,
    pub column: ColumnInfo,
    meta: ItemMeta,
}

impl FieldItem {
    pub fn new(table_node: PlanNodeId, table_name: impl Into<String>, column: ColumnInfo) -> Self {
        let meta = ItemMeta {
            fixed: true,
            maybe_null: column.nullable,
            null_value: false,
            max_length: column.max_length,
            decimals: column.decimals,
            field_type: column.column_type,
        };
        Self {
            table_node,
            table_name: table_name.into(),
            column,
            meta,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: Value,
    meta: ItemMeta,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        let meta = ItemMeta {
            fixed: true,
            maybe_null: value.is_null(),
            null_value: value.is_null(),
            max_length: value.max_length(),
            decimals: value.decimals(),
            field_type: value.field_type(),
        };
        Self { value, meta }
    }
}

/// Scalar subquery planned elsewhere, kept opaque here
#[derive(Debug, Clone)]
pub struct SubqueryItem {
    pub label: String,
    /// Outer tables a correlated subquery refers to
    pub outer_tables: ReferTables,
    meta: ItemMeta,
}

impl SubqueryItem {
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            label: label.into(),
            outer_tables: ReferTables::new(),
            meta: ItemMeta {
                fixed: true,
                maybe_null: true,
                null_value: false,
                max_length: field_type.default_length(),
                decimals: field_type.default_decimals(),
                field_type,
            },
        }
    }

    pub fn correlated_with(mut self, table: PlanNodeId) -> Self {
        self.outer_tables.insert(table);
        self
    }
}

/// Expression tree node
#[derive(Debug, Clone)]
pub enum Item {
    Literal(Literal),
    /// Unbound column reference
    Column(ColumnRef),
    /// Bound column
    Field(FieldItem),
    Func(Box<FunctionNode>),
    Subquery(SubqueryItem),
}

impl Item {
    pub fn literal(value: Value) -> Self {
        Item::Literal(Literal::new(value))
    }

    pub fn null() -> Self {
        Self::literal(Value::Null)
    }

    pub fn int(value: i64) -> Self {
        Self::literal(Value::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(Value::String(value.into()))
    }

    /// Unbound column reference, `col` or `table.col`
    pub fn column(name: &str) -> Self {
        Item::Column(ColumnRef::parse(name))
    }

    pub fn field(table_node: PlanNodeId, table_name: impl Into<String>, column: ColumnInfo) -> Self {
        Item::Field(FieldItem::new(table_node, table_name, column))
    }

    pub fn subquery(subquery: SubqueryItem) -> Self {
        Item::Subquery(subquery)
    }

    pub fn builtin(func: BuiltinFunc, args: Vec<Item>) -> Self {
        Item::Func(Box::new(FunctionNode::builtin(func, args)))
    }

    pub fn eq(left: Item, right: Item) -> Self {
        Self::builtin(BuiltinFunc::Eq, vec![left, right])
    }

    pub fn ne(left: Item, right: Item) -> Self {
        Self::builtin(BuiltinFunc::Ne, vec![left, right])
    }

    pub fn lt(left: Item, right: Item) -> Self {
        Self::builtin(BuiltinFunc::Lt, vec![left, right])
    }

    pub fn gt(left: Item, right: Item) -> Self {
        Self::builtin(BuiltinFunc::Gt, vec![left, right])
    }

    pub fn and(left: Item, right: Item) -> Self {
        Self::builtin(BuiltinFunc::And, vec![left, right])
    }

    pub fn or(left: Item, right: Item) -> Self {
        Self::builtin(BuiltinFunc::Or, vec![left, right])
    }

    pub fn not(operand: Item) -> Self {
        Self::builtin(BuiltinFunc::Not, vec![operand])
    }

    pub fn is_null(operand: Item) -> Self {
        Self::builtin(BuiltinFunc::IsNull, vec![operand])
    }

    pub fn is_not_null(operand: Item) -> Self {
        Self::builtin(BuiltinFunc::IsNotNull, vec![operand])
    }

    pub fn meta(&self) -> &ItemMeta {
        match self {
            Item::Literal(lit) => &lit.meta,
            Item::Column(_) => &UNBOUND_META,
            Item::Field(field) => &field.meta,
            Item::Func(func) => func.meta(),
            Item::Subquery(sub) => &sub.meta,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.meta().fixed
    }

    pub fn maybe_null(&self) -> bool {
        self.meta().maybe_null
    }

    pub fn max_length(&self) -> u32 {
        self.meta().max_length
    }

    pub fn decimals(&self) -> Decimals {
        self.meta().decimals
    }

    pub fn field_type(&self) -> FieldType {
        self.meta().field_type
    }

    pub fn result_type(&self) -> ItemResult {
        self.meta().result_type()
    }

    pub fn decimal_int_part(&self) -> u32 {
        self.meta().decimal_int_part()
    }

    pub fn facts(&self) -> ExprFacts {
        match self {
            Item::Func(func) => func.facts(),
            Item::Subquery(_) => ExprFacts {
                has_subquery: true,
                ..ExprFacts::NONE
            },
            _ => ExprFacts::NONE,
        }
    }

    pub fn as_func(&self) -> Option<&FunctionNode> {
        match self {
            Item::Func(func) => Some(func),
            _ => None,
        }
    }

    pub fn functype(&self) -> Option<Functype> {
        self.as_func().map(FunctionNode::functype)
    }

    pub fn extend_refer_tables(&self, into: &mut ReferTables) {
        match self {
            Item::Field(field) => {
                into.insert(field.table_node);
            }
            Item::Func(func) => into.extend(func.refer_tables().iter().copied()),
            Item::Subquery(sub) => into.extend(sub.outer_tables.iter().copied()),
            Item::Literal(_) | Item::Column(_) => {}
        }
    }

    pub fn refer_tables(&self) -> ReferTables {
        let mut tables = ReferTables::new();
        self.extend_refer_tables(&mut tables);
        tables
    }

    /// Rendered display label, the identity used for deduplication
    pub fn item_name(&self) -> String {
        self.to_string()
    }

    /// Name-resolution pass. Returns the node to store in place of `self`.
    pub fn fix_fields_with(self, ctx: &dyn NameResolutionContext) -> Result<Item> {
        match self {
            Item::Column(column) => ctx.resolve(&column),
            Item::Func(func) => Ok(Item::Func(Box::new((*func).fix_fields_with(ctx)?))),
            other => Ok(other),
        }
    }

    /// Fix-up without a resolution context; only constant subtrees succeed
    pub fn fix_fields(&mut self) -> Result<()> {
        match self {
            Item::Column(column) => Err(PlanError::UnresolvedColumn(column.to_string())),
            Item::Func(func) => func.fix_fields(),
            _ => Ok(()),
        }
    }

    /// Reference pass: record which plan node owns this expression
    pub fn fix_refer(&self, ctx: &mut ReferContext<'_>) {
        match self {
            Item::Func(func) => func.fix_refer(ctx),
            Item::Field(field) => ctx.add_sel_to_refered_map(field.table_node, self),
            Item::Subquery(_) => {
                let owner = ctx.plan_node();
                ctx.add_sel_to_refered_map(owner, self);
            }
            Item::Literal(_) => {}
            Item::Column(column) => {
                warn!("unbound column {} reached the reference pass", column);
            }
        }
    }

    /// Structural copy; function nodes are rebuilt through the factory
    pub fn clone_struct(&self, registry: &FunctionRegistry) -> Result<Item> {
        match self {
            Item::Func(func) => Ok(Item::Func(Box::new(func.clone_struct(registry)?))),
            other => Ok(other.clone()),
        }
    }

    /// Render for a shard-level query
    pub fn to_sql(&self, registry: &FunctionRegistry) -> Result<String> {
        match self {
            Item::Func(func) => func.to_sql(registry),
            other => Ok(other.to_string()),
        }
    }

    pub fn hash_code(&self) -> u64 {
        match self {
            Item::Func(func) => func.hash_code(),
            other => fingerprint(&other.item_name()),
        }
    }
}

pub(crate) fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

impl From<FunctionNode> for Item {
    fn from(func: FunctionNode) -> Self {
        Item::Func(Box::new(func))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Literal(lit) => write!(f, "{}", lit.value),
            Item::Column(column) => write!(f, "{}", column),
            Item::Field(field) => write!(f, "`{}`.`{}`", field.table_name, field.column.column_name),
            Item::Func(func) => write!(f, "{}", func),
            Item::Subquery(sub) => write!(f, "({})", sub.label),
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Item::Func(a), Item::Func(b)) => a == b,
            (Item::Field(a), Item::Field(b)) => {
                a.table_node == b.table_node && self.item_name() == other.item_name()
            }
            (Item::Literal(_), Item::Literal(_))
            | (Item::Column(_), Item::Column(_))
            | (Item::Subquery(_), Item::Subquery(_)) => self.item_name() == other.item_name(),
            _ => false,
        }
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_ref_parse() {
        let col = ColumnRef::parse("age");
        assert!(col.table.is_none());
        assert_eq!(col.column, "age");

        let col = ColumnRef::parse("u.age");
        assert_eq!(col.table.as_deref(), Some("u"));
        assert_eq!(col.column, "age");
        assert_eq!(col.to_string(), "`u`.`age`");
    }

    #[test]
    fn test_literal_metadata() {
        let item = Item::int(12345);
        assert!(item.is_fixed());
        assert!(!item.maybe_null());
        assert_eq!(item.max_length(), 5);
        assert_eq!(item.decimals(), Decimals::Fixed(0));
        assert_eq!(item.result_type(), ItemResult::Int);

        let item = Item::null();
        assert!(item.maybe_null());
        assert!(item.meta().null_value);
        assert!(item.refer_tables().is_empty());
    }

    #[test]
    fn test_field_metadata() {
        let column = ColumnInfo::new("price", FieldType::NewDecimal)
            .with_length(10)
            .with_decimals(Decimals::Fixed(2))
            .not_null();
        let item = Item::field(PlanNodeId(3), "orders", column);

        assert!(item.is_fixed());
        assert!(!item.maybe_null());
        assert_eq!(item.max_length(), 10);
        assert_eq!(item.decimal_int_part(), 8);
        assert_eq!(item.refer_tables(), ReferTables::from([PlanNodeId(3)]));
        assert_eq!(item.to_string(), "`orders`.`price`");
    }

    #[test]
    fn test_unbound_column_cannot_fix_without_context() {
        let mut item = Item::column("t.a");
        assert!(!item.is_fixed());
        let err = item.fix_fields().unwrap_err();
        assert!(err.is_binding_failure());
    }

    #[test]
    fn test_subquery_facts() {
        let sub = SubqueryItem::new("SELECT max(x) FROM s", FieldType::Long)
            .correlated_with(PlanNodeId(1));
        let item = Item::subquery(sub);
        assert!(item.facts().has_subquery);
        assert!(!item.facts().has_aggregate);
        assert_eq!(item.refer_tables(), ReferTables::from([PlanNodeId(1)]));
    }

    #[test]
    fn test_facts_union() {
        let a = ExprFacts {
            has_aggregate: true,
            ..ExprFacts::NONE
        };
        let b = ExprFacts {
            has_is_null: true,
            ..ExprFacts::NONE
        };
        let merged = a | b;
        assert!(merged.has_aggregate);
        assert!(merged.has_is_null);
        assert!(!merged.has_subquery);
        assert!(!merged.has_volatile);
    }

    #[test]
    fn test_leaf_equality() {
        let col = ColumnInfo::new("a", FieldType::Long);
        let a1 = Item::field(PlanNodeId(0), "t", col.clone());
        let a2 = Item::field(PlanNodeId(0), "t", col.clone());
        let a3 = Item::field(PlanNodeId(1), "t", col);
        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
        assert_eq!(a1.hash_code(), a2.hash_code());

        assert_eq!(Item::int(1), Item::int(1));
        assert_ne!(Item::int(1), Item::string("1"));
    }
}
