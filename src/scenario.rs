//! Explain scenarios loaded from JSON.
//!
//! A scenario declares a catalog, a plan tree, WHERE predicates placed at
//! the root of that tree, and optionally extra functions to register:
//!
//! ```json
//! {
//!   "tables": [{"name": "users", "columns": [{"name": "id", "type": "long"}]}],
//!   "plan": {"table": {"name": "users", "alias": "u"}},
//!   "where": [{"call": {"name": "isnull", "args": [{"column": "u.id"}]}}]
//! }
//! ```

use crate::catalog::{Catalog, ColumnInfo};
use crate::expression::{FunctionDef, FunctionRegistry, Item, SubqueryItem};
use crate::plan::{JoinType, PlanNodeId, PlanTree};
use crate::types::{Decimals, FieldType, Value};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: FieldType,
    #[serde(default)]
    pub length: Option<u32>,
    /// Raw scale; 31 and above means not fixed
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    fn to_column_info(&self) -> ColumnInfo {
        let mut column = ColumnInfo::new(&self.name, self.column_type);
        if let Some(length) = self.length {
            column = column.with_length(length);
        }
        if let Some(raw) = self.decimals {
            column = column.with_decimals(Decimals::from_raw(raw));
        }
        if !self.nullable {
            column = column.not_null();
        }
        column
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSpec {
    Table {
        name: String,
        #[serde(default)]
        alias: Option<String>,
    },
    Join {
        kind: JoinKind,
        left: Box<PlanSpec>,
        right: Box<PlanSpec>,
    },
    Query {
        child: Box<PlanSpec>,
    },
    NoName,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprSpec {
    /// `col` or `table.col`
    Column(String),
    Value(Value),
    Call {
        name: String,
        #[serde(default)]
        args: Vec<ExprSpec>,
    },
    Subquery {
        label: String,
        #[serde(rename = "type")]
        field_type: FieldType,
        /// Visible names of outer tables the subquery refers to
        #[serde(default)]
        correlated: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub tables: Vec<TableSpec>,
    pub plan: PlanSpec,
    #[serde(default, rename = "where")]
    pub predicates: Vec<ExprSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub push_down_restricted: bool,
}

/// Everything a scenario describes, ready for the planner
#[derive(Debug)]
pub struct BuiltScenario {
    pub catalog: Catalog,
    pub plan: PlanTree,
    pub root: PlanNodeId,
    pub registry: Arc<FunctionRegistry>,
    pub predicates: Vec<Item>,
    pub push_down_restricted: bool,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse scenario")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn build(&self) -> Result<BuiltScenario> {
        let mut catalog = Catalog::new();
        for table in &self.tables {
            let columns = table.columns.iter().map(ColumnSpec::to_column_info).collect();
            catalog
                .create_table(&table.name, columns)
                .with_context(|| format!("Failed to create table {}", table.name))?;
        }

        let mut registry = FunctionRegistry::with_builtins();
        for def in &self.functions {
            registry
                .register_udf(def.clone())
                .with_context(|| format!("Failed to register function {}", def.name))?;
        }

        let mut plan = PlanTree::new();
        let root = build_plan(&catalog, &mut plan, &self.plan)?;

        let predicates = self
            .predicates
            .iter()
            .map(|expr| build_expr(&registry, &plan, root, expr))
            .collect::<Result<Vec<_>>>()?;

        Ok(BuiltScenario {
            catalog,
            plan,
            root,
            registry: Arc::new(registry),
            predicates,
            push_down_restricted: self.push_down_restricted,
        })
    }
}

fn build_plan(catalog: &Catalog, plan: &mut PlanTree, node: &PlanSpec) -> Result<PlanNodeId> {
    let id = match node {
        PlanSpec::Table { name, alias } => plan.add_table(catalog.get_table(name)?, alias.clone()),
        PlanSpec::Join { kind, left, right } => {
            let left = build_plan(catalog, plan, left)?;
            let right = build_plan(catalog, plan, right)?;
            match kind {
                JoinKind::Inner => plan.add_join(left, right, JoinType::Inner)?,
                JoinKind::Left => plan.add_join(left, right, JoinType::LeftOuter)?,
                JoinKind::Right => plan.add_right_join(left, right)?,
            }
        }
        PlanSpec::Query { child } => {
            let child = build_plan(catalog, plan, child)?;
            plan.add_query(child)?
        }
        PlanSpec::NoName => plan.add_no_name(),
    };
    Ok(id)
}

fn build_expr(
    registry: &FunctionRegistry,
    plan: &PlanTree,
    root: PlanNodeId,
    expr: &ExprSpec,
) -> Result<Item> {
    match expr {
        ExprSpec::Column(name) => Ok(Item::column(name)),
        ExprSpec::Value(value) => Ok(Item::literal(value.clone())),
        ExprSpec::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| build_expr(registry, plan, root, arg))
                .collect::<Result<Vec<_>>>()?;
            let node = registry
                .create_native_func(name, args)
                .with_context(|| format!("Failed to build call to {}", name))?;
            Ok(Item::from(node))
        }
        ExprSpec::Subquery {
            label,
            field_type,
            correlated,
        } => {
            let mut subquery = SubqueryItem::new(label, *field_type);
            for outer in correlated {
                let named: Vec<PlanNodeId> = plan
                    .table_nodes_under(root)
                    .into_iter()
                    .filter(|id| {
                        plan.table(*id)
                            .map_or(false, |t| t.visible_name().eq_ignore_ascii_case(outer))
                    })
                    .collect();
                let table = match named.as_slice() {
                    [table] => *table,
                    [] => return Err(anyhow!("Subquery refers to unknown table {}", outer)),
                    _ => return Err(anyhow!("Subquery refers to non-unique table {}", outer)),
                };
                subquery = subquery.correlated_with(table);
            }
            Ok(Item::subquery(subquery))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Functype;
    use crate::plan::PlanNodeType;

    const SCENARIO: &str = r#"{
        "tables": [
            {"name": "users", "columns": [
                {"name": "id", "type": "long", "nullable": false},
                {"name": "score", "type": "newdecimal", "length": 8, "decimals": 2}
            ]},
            {"name": "orders", "columns": [{"name": "user_id", "type": "long"}]}
        ],
        "plan": {"query": {"child": {"join": {
            "kind": "right",
            "left": {"table": {"name": "users", "alias": "u"}},
            "right": {"table": {"name": "orders"}}
        }}}},
        "where": [
            {"call": {"name": "isnull", "args": [{"column": "u.score"}]}},
            {"call": {"name": "=", "args": [{"value": {"int": 1}}, {"value": {"int": 1}}]}},
            {"subquery": {"label": "SELECT 1", "type": "long", "correlated": ["u"]}}
        ],
        "functions": [{"name": "bucket", "arity": {"exact": 1}, "inference": "decimal"}],
        "push_down_restricted": true
    }"#;

    #[test]
    fn test_build_scenario() {
        let built = Scenario::from_json(SCENARIO).unwrap().build().unwrap();

        assert_eq!(built.catalog.table_names(), vec!["orders", "users"]);
        assert_eq!(built.plan.node_type(built.root), PlanNodeType::Query);
        assert!(built.push_down_restricted);
        assert!(built.registry.is_native_func("bucket"));

        // Right join stored with swapped children
        let join = built.plan.child(built.root).unwrap();
        let join_node = built.plan.join(join).unwrap();
        assert!(join_node.is_left_outer_join());
        assert_eq!(
            built.plan.table(join_node.left_node()).unwrap().visible_name(),
            "orders"
        );

        assert_eq!(built.predicates.len(), 3);
        assert_eq!(built.predicates[0].functype(), Some(Functype::IsNullFunc));
        assert!(built.predicates[2].facts().has_subquery);
        assert_eq!(built.predicates[2].refer_tables().len(), 1);
    }

    #[test]
    fn test_column_spec_decimals() {
        let built = Scenario::from_json(SCENARIO).unwrap().build().unwrap();
        let users = built.catalog.get_table("users").unwrap();
        let score = users.column("score").unwrap();
        assert_eq!(score.max_length, 8);
        assert_eq!(score.decimals, Decimals::Fixed(2));
        assert!(!users.column("id").unwrap().nullable);
    }

    #[test]
    fn test_build_errors() {
        let scenario = Scenario::from_json(
            r#"{"tables": [], "plan": {"table": {"name": "missing"}}}"#,
        )
        .unwrap();
        assert!(scenario.build().is_err());

        let scenario = Scenario::from_json(
            r#"{"tables": [], "plan": "no_name",
                "where": [{"call": {"name": "frobnicate", "args": []}}]}"#,
        )
        .unwrap();
        let err = scenario.build().unwrap_err();
        assert!(err.to_string().contains("frobnicate"));

        assert!(Scenario::from_json("{").is_err());
    }

    #[test]
    fn test_correlated_table_must_be_unique() {
        let self_join = |correlated: &str| {
            let text = format!(
                r#"{{
                    "tables": [{{"name": "users", "columns": [{{"name": "id", "type": "long"}}]}}],
                    "plan": {{"join": {{
                        "kind": "inner",
                        "left": {{"table": {{"name": "users"}}}},
                        "right": {{"table": {{"name": "users", "alias": "v"}}}}
                    }}}},
                    "where": [{{"subquery": {{"label": "SELECT 1", "type": "long", "correlated": ["{}"]}}}}]
                }}"#,
                correlated
            );
            Scenario::from_json(&text).unwrap().build()
        };

        let built = self_join("v").unwrap();
        assert_eq!(built.predicates[0].refer_tables().len(), 1);

        let err = self_join("nobody").unwrap_err();
        assert!(err.to_string().contains("unknown table nobody"));

        // Give the right leaf the same visible name as the left one
        let text = r#"{
            "tables": [{"name": "users", "columns": [{"name": "id", "type": "long"}]}],
            "plan": {"join": {
                "kind": "inner",
                "left": {"table": {"name": "users"}},
                "right": {"table": {"name": "users"}}
            }},
            "where": [{"subquery": {"label": "SELECT 1", "type": "long", "correlated": ["users"]}}]
        }"#;
        let err = Scenario::from_json(text).unwrap().build().unwrap_err();
        assert!(err.to_string().contains("non-unique table users"));
    }
}
