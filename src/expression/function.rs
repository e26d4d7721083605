//! Function and operator nodes.
//!
//! A `FunctionNode` applies a built-in or registered function to an
//! ordered list of argument nodes. It owns:
//! - type inference (`fix_length_and_dec` and the reusable strategies)
//! - the name-resolution pass (`fix_fields_with`, then `fix_fields`)
//! - the reference pass (`fix_refer`), which decides push-down ownership
//! - identity (`PartialEq`/`Hash`) and factory-based cloning

use crate::error::{PlanError, Result};
use crate::expression::builtin::BuiltinFunc;
use crate::expression::functype::Functype;
use crate::expression::item::{fingerprint, ExprFacts, Item, ItemMeta, ReferTables};
use crate::expression::registry::{FunctionDef, FunctionRegistry, LengthInference};
use crate::expression::resolver::NameResolutionContext;
use crate::plan::{PlanNodeType, ReferContext};
use crate::types::{Decimals, FieldType, MAX_FIELD_LENGTH};
use log::{debug, trace, warn};
use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Number of arguments a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}

/// What a function node applies
#[derive(Debug, Clone)]
pub enum FunctionKind {
    Builtin(BuiltinFunc),
    /// Registered by name in the function registry
    Udf(Arc<FunctionDef>),
}

impl FunctionKind {
    pub fn name(&self) -> &str {
        match self {
            FunctionKind::Builtin(func) => func.name(),
            FunctionKind::Udf(def) => &def.name,
        }
    }

    pub fn functype(&self) -> Functype {
        match self {
            FunctionKind::Builtin(func) => func.functype(),
            FunctionKind::Udf(_) => Functype::UdfFunc,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            FunctionKind::Builtin(func) => func.arity(),
            FunctionKind::Udf(def) => def.arity,
        }
    }

    /// Facts contributed by the function itself, independent of its arguments
    pub fn own_facts(&self) -> ExprFacts {
        match self {
            FunctionKind::Builtin(func) => func.own_facts(),
            FunctionKind::Udf(def) => ExprFacts {
                has_volatile: def.volatile,
                ..ExprFacts::NONE
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    kind: FunctionKind,
    args: Vec<Item>,
    meta: ItemMeta,
    facts: ExprFacts,
    refer_tables: ReferTables,
}

impl FunctionNode {
    /// Build a node, checking the argument count
    pub fn try_new(kind: FunctionKind, args: Vec<Item>) -> Result<Self> {
        let arity = kind.arity();
        if !arity.accepts(args.len()) {
            return Err(PlanError::ArgumentCount {
                function: kind.name().to_string(),
                expected: arity.to_string(),
                actual: args.len(),
            });
        }
        Ok(Self::new(kind, args))
    }

    pub(crate) fn new(kind: FunctionKind, args: Vec<Item>) -> Self {
        let facts = kind.own_facts();
        Self {
            kind,
            args,
            meta: ItemMeta::unfixed(),
            facts,
            refer_tables: ReferTables::new(),
        }
    }

    pub(crate) fn builtin(func: BuiltinFunc, args: Vec<Item>) -> Self {
        debug_assert!(
            func.arity().accepts(args.len()),
            "{} called with {} arguments",
            func.name(),
            args.len()
        );
        Self::new(FunctionKind::Builtin(func), args)
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn func_name(&self) -> &str {
        self.kind.name()
    }

    pub fn functype(&self) -> Functype {
        self.kind.functype()
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn arguments(&self) -> &[Item] {
        &self.args
    }

    pub fn into_arguments(self) -> Vec<Item> {
        self.args
    }

    pub fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut ItemMeta {
        &mut self.meta
    }

    pub fn facts(&self) -> ExprFacts {
        self.facts
    }

    pub fn refer_tables(&self) -> &ReferTables {
        &self.refer_tables
    }

    pub fn is_null(&self) -> bool {
        self.meta.null_value
    }

    /// Division by zero or NULL: the node evaluates to NULL from here on
    pub fn signal_divide_by_null(&mut self) {
        warn!("divide by zero in {}", self);
        self.meta.null_value = true;
        self.meta.maybe_null = true;
    }

    /// Name-resolution pass.
    ///
    /// Every argument is bound through `ctx` and the returned node replaces
    /// it. The refer-table set, facts and the whole `ItemMeta` (type,
    /// length, scale, nullability) are re-derived from the bound arguments
    /// on every call. Any binding failure consumes the node.
    pub fn fix_fields_with(mut self, ctx: &dyn NameResolutionContext) -> Result<Self> {
        self.refer_tables.clear();
        self.meta = ItemMeta::unfixed();
        let args = std::mem::take(&mut self.args);
        self.args = args
            .into_iter()
            .map(|arg| arg.fix_fields_with(ctx))
            .collect::<Result<Vec<_>>>()?;
        self.refresh_from_args();
        trace!(
            "bound {} referring to {} table(s)",
            self,
            self.refer_tables.len()
        );

        self.fix_fields()?;
        Ok(self)
    }

    /// Fix-up without a resolution context. No-op once fixed.
    pub fn fix_fields(&mut self) -> Result<()> {
        if self.meta.fixed {
            return Ok(());
        }

        for arg in &mut self.args {
            if !arg.is_fixed() {
                arg.fix_fields()?;
            }
        }
        self.refresh_from_args();
        self.meta.maybe_null = self.args.iter().any(Item::maybe_null);
        self.fix_length_and_dec()?;
        self.meta.fixed = true;
        Ok(())
    }

    fn refresh_from_args(&mut self) {
        let mut tables = ReferTables::new();
        for arg in &self.args {
            arg.extend_refer_tables(&mut tables);
        }
        self.refer_tables = tables;
        self.facts = self
            .args
            .iter()
            .map(Item::facts)
            .fold(self.kind.own_facts(), ExprFacts::union);
    }

    /// Set `max_length`, `decimals`, `field_type` and nullability from the arguments
    pub fn fix_length_and_dec(&mut self) -> Result<()> {
        match self.kind.clone() {
            FunctionKind::Builtin(func) => func.fix_length_and_dec(self),
            FunctionKind::Udf(def) => {
                match def.inference {
                    LengthInference::Real => self.count_real_length(),
                    LengthInference::Decimal => self.count_decimal_length(),
                    LengthInference::String => self.count_string_result_length()?,
                }
                self.meta.field_type = def
                    .field_type
                    .unwrap_or_else(|| def.inference.default_field_type());
                Ok(())
            }
        }
    }

    /// Floating-point inference: integer part and scale are each the widest
    /// among the arguments. An unbounded argument scale makes the result
    /// unbounded, in which case the length is the widest argument length.
    /// The summed length saturates at `MAX_FIELD_LENGTH`.
    pub fn count_real_length(&mut self) {
        let mut int_part: u32 = 0;
        let mut decimals = Decimals::Fixed(0);
        let mut max_length: u32 = 0;

        for arg in &self.args {
            if let Decimals::Fixed(scale) = decimals {
                decimals = arg.decimals().max(Decimals::Fixed(scale));
                if let Decimals::Fixed(arg_scale) = arg.decimals() {
                    int_part = int_part.max(arg.max_length().saturating_sub(arg_scale));
                }
            }
            max_length = max_length.max(arg.max_length());
        }

        if let Decimals::Fixed(scale) = decimals {
            max_length = int_part.checked_add(scale).unwrap_or(MAX_FIELD_LENGTH);
        }
        self.meta.decimals = decimals;
        self.meta.max_length = max_length;
    }

    /// Fixed-point inference: scale is the widest argument scale, integer
    /// part the widest argument integer part, length their sum.
    pub fn count_decimal_length(&mut self) {
        let mut max_int_part: u32 = 0;
        let mut scale: u32 = 0;

        for arg in &self.args {
            scale = scale.max(arg.decimals().fixed_point_scale());
            max_int_part = max_int_part.max(arg.decimal_int_part());
        }

        self.meta.decimals = Decimals::Fixed(scale);
        self.meta.max_length = max_int_part + scale;
    }

    /// String-result inference. Only string functions compute anything here.
    pub fn count_string_result_length(&mut self) -> Result<()> {
        match &self.kind {
            FunctionKind::Builtin(func) => {
                let func = *func;
                func.count_string_result_length(self)
            }
            FunctionKind::Udf(_) => Ok(()),
        }
    }

    /// Reference pass: record the plan node that owns this expression.
    ///
    /// Ownership, in order of precedence:
    /// 1. an aggregate stays at the current node; arguments resolve on their own
    /// 2. a constant goes to the current table node, or else to its first child
    /// 3. a single-table expression goes to that table, except an IS NULL test
    ///    on the right side of a left join, which stays at the join
    /// 4. a multi-table expression stays at the current node; arguments are
    ///    resolved unless the context is push-down restricted
    pub fn fix_refer(&self, ctx: &mut ReferContext<'_>) {
        let plan_node = ctx.plan_node();
        let this = Item::from(self.clone());

        if self.facts.has_aggregate {
            debug!("{} contains an aggregate, kept at {}", self, plan_node);
            ctx.add_sel_to_refered_map(plan_node, &this);
            self.fix_refer_args(ctx);
            return;
        }

        let mut tables = self.refer_tables.iter().copied();
        match (tables.next(), tables.next()) {
            (None, _) => {
                let owner = match ctx.plan().node_type(plan_node) {
                    PlanNodeType::Table => plan_node,
                    _ => ctx.plan().child(plan_node).unwrap_or(plan_node),
                };
                debug!("constant {} placed at {}", self, owner);
                ctx.add_sel_to_refered_map(owner, &this);
            }
            (Some(table), None) => {
                let unpushable_is_null = self.facts.has_is_null
                    && ctx
                        .plan()
                        .join(plan_node)
                        .map_or(false, |join| {
                            join.is_left_outer_join() && join.right_node() == table
                        });

                if unpushable_is_null {
                    debug!(
                        "{} tests NULL on the inner side of left join {}, kept at the join",
                        self, plan_node
                    );
                    ctx.add_sel_to_refered_map(plan_node, &this);
                    self.fix_refer_args(ctx);
                } else {
                    debug!("{} pushed down to {}", self, table);
                    ctx.add_sel_to_refered_map(table, &this);
                }
            }
            (Some(_), Some(_)) => {
                debug!("{} spans several tables, kept at {}", self, plan_node);
                ctx.add_sel_to_refered_map(plan_node, &this);
                if !ctx.is_push_down_node() {
                    self.fix_refer_args(ctx);
                }
            }
        }
    }

    fn fix_refer_args(&self, ctx: &mut ReferContext<'_>) {
        for arg in &self.args {
            arg.fix_refer(ctx);
        }
    }

    /// `hash(name) * 31`, then `acc * 31 + hash(arg)` for each argument in order
    pub fn hash_code(&self) -> u64 {
        let prime: u64 = 31;
        self.args.iter().fold(
            fingerprint(self.func_name()).wrapping_mul(prime),
            |acc, arg| acc.wrapping_mul(prime).wrapping_add(arg.hash_code()),
        )
    }

    /// Structural clone: arguments are cloned and the node is rebuilt by name
    pub fn clone_struct(&self, registry: &FunctionRegistry) -> Result<FunctionNode> {
        self.check_registered(registry)?;
        let args = self
            .args
            .iter()
            .map(|arg| arg.clone_struct(registry))
            .collect::<Result<Vec<_>>>()?;
        registry.create_native_func(self.func_name(), args)
    }

    /// Calculation clone: rebuild by name over already computed arguments
    pub fn clone_for_calculation(
        &self,
        registry: &FunctionRegistry,
        cal_args: Vec<Item>,
    ) -> Result<FunctionNode> {
        self.check_registered(registry)?;
        registry.create_native_func(self.func_name(), cal_args)
    }

    /// Render for a shard-level query; every function in the tree must be registered
    pub fn to_sql(&self, registry: &FunctionRegistry) -> Result<String> {
        self.check_registered(registry)?;
        for arg in &self.args {
            arg.to_sql(registry)?;
        }
        Ok(self.to_string())
    }

    fn check_registered(&self, registry: &FunctionRegistry) -> Result<()> {
        if registry.is_native_func(self.func_name()) {
            Ok(())
        } else {
            Err(PlanError::Unsupported(self.func_name().to_string()))
        }
    }

    pub fn has_timestamp_args(&self) -> bool {
        self.any_field_arg(|t| t == FieldType::Timestamp)
    }

    pub fn has_date_args(&self) -> bool {
        self.any_field_arg(|t| matches!(t, FieldType::Date | FieldType::DateTime))
    }

    pub fn has_time_args(&self) -> bool {
        self.any_field_arg(|t| matches!(t, FieldType::Time | FieldType::DateTime))
    }

    pub fn has_datetime_args(&self) -> bool {
        self.any_field_arg(|t| t == FieldType::DateTime)
    }

    fn any_field_arg(&self, pred: impl Fn(FieldType) -> bool) -> bool {
        debug_assert!(self.args.iter().all(Item::is_fixed));
        self.args.iter().any(|arg| match arg {
            Item::Field(field) => pred(field.column.column_type),
            _ => false,
        })
    }
}

impl fmt::Display for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::Builtin(func) => func.render(&self.args, f),
            FunctionKind::Udf(def) => {
                write!(f, "{}(", def.name)?;
                for (i, arg) in self.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Equal when name, arity and rendered label match. Argument subtrees are
/// compared only through the label.
impl PartialEq for FunctionNode {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.func_name() == other.func_name()
            && self.arg_count() == other.arg_count()
            && self.to_string() == other.to_string()
    }
}

impl Eq for FunctionNode {}

impl Hash for FunctionNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::expression::item::ColumnRef;
    use crate::plan::PlanNodeId;
    use crate::types::{ItemResult, Value};

    fn field(table: usize, name: &str, max_length: u32, decimals: Decimals) -> Item {
        Item::field(
            PlanNodeId(table),
            format!("t{}", table),
            ColumnInfo::new(name, FieldType::Double)
                .with_length(max_length)
                .with_decimals(decimals),
        )
    }

    /// Binds `t<n>.<col>` to a nullable column of table node `n`
    struct NumberedTables;

    impl NameResolutionContext for NumberedTables {
        fn resolve(&self, column: &ColumnRef) -> Result<Item> {
            let table = column
                .table
                .as_deref()
                .and_then(|t| t.strip_prefix('t'))
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| PlanError::UnknownColumn(column.to_string()))?;
            Ok(field(table, &column.column, 7, Decimals::Fixed(1)))
        }
    }

    fn concat(args: Vec<Item>) -> FunctionNode {
        FunctionNode::builtin(BuiltinFunc::Concat, args)
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::Range(0, 1).accepts(0));
        assert!(!Arity::Range(0, 1).accepts(2));
        assert!(Arity::AtLeast(1).accepts(7));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert_eq!(Arity::AtLeast(2).to_string(), "at least 2");
    }

    #[test]
    fn test_try_new_checks_arity() {
        let err = FunctionNode::try_new(
            FunctionKind::Builtin(BuiltinFunc::Eq),
            vec![Item::int(1)],
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::ArgumentCount { actual: 1, .. }));
    }

    #[test]
    fn test_count_real_length_unbounded_takes_max_length() {
        // concat(a, b): a has length 10 and unbounded scale, b has length 5 scale 2
        let mut node = concat(vec![
            field(0, "a", 10, Decimals::NotFixed),
            field(0, "b", 5, Decimals::Fixed(2)),
        ]);
        node.count_real_length();
        assert_eq!(node.meta().decimals, Decimals::NotFixed);
        assert_eq!(node.meta().max_length, 10);

        // Order of arguments does not matter
        let mut node = concat(vec![
            field(0, "b", 5, Decimals::Fixed(2)),
            field(0, "a", 10, Decimals::NotFixed),
        ]);
        node.count_real_length();
        assert_eq!(node.meta().decimals, Decimals::NotFixed);
        assert_eq!(node.meta().max_length, 10);
    }

    #[test]
    fn test_count_real_length_fixed() {
        // int parts 6 and 2, scales 1 and 3 -> 6 + 3
        let mut node = concat(vec![
            field(0, "a", 7, Decimals::Fixed(1)),
            field(0, "b", 5, Decimals::Fixed(3)),
        ]);
        node.count_real_length();
        assert_eq!(node.meta().decimals, Decimals::Fixed(3));
        assert_eq!(node.meta().max_length, 9);
    }

    #[test]
    fn test_count_real_length_saturates() {
        let mut node = concat(vec![
            field(0, "a", MAX_FIELD_LENGTH, Decimals::Fixed(0)),
            field(0, "b", 5, Decimals::Fixed(3)),
        ]);
        node.count_real_length();
        assert_eq!(node.meta().decimals, Decimals::Fixed(3));
        assert_eq!(node.meta().max_length, MAX_FIELD_LENGTH);
    }

    #[test]
    fn test_count_decimal_length() {
        let mut node = concat(vec![
            field(0, "a", 12, Decimals::Fixed(2)),
            field(0, "b", 8, Decimals::Fixed(4)),
        ]);
        node.count_decimal_length();
        // int parts 10 and 4, scale 4
        assert_eq!(node.meta().decimals, Decimals::Fixed(4));
        assert_eq!(node.meta().max_length, 14);
    }

    #[test]
    fn test_count_string_result_length_default_is_noop() {
        let mut node = FunctionNode::builtin(BuiltinFunc::Abs, vec![Item::int(-5)]);
        let before = node.meta().clone();
        assert!(node.count_string_result_length().is_ok());
        assert_eq!(node.meta(), &before);
    }

    #[test]
    fn test_fix_fields_constant_tree() {
        let mut node = FunctionNode::builtin(
            BuiltinFunc::Plus,
            vec![
                Item::int(1),
                Item::builtin(BuiltinFunc::Mul, vec![Item::int(20), Item::int(3)]),
            ],
        );
        node.fix_fields().unwrap();
        assert!(node.meta().fixed);
        assert!(node.arguments()[1].is_fixed());
        assert_eq!(node.meta().result_type(), ItemResult::Int);
        assert!(node.refer_tables().is_empty());
        assert!(!node.meta().maybe_null);
    }

    #[test]
    fn test_fix_fields_is_idempotent() {
        let mut node = FunctionNode::builtin(
            BuiltinFunc::Plus,
            vec![
                field(1, "a", 7, Decimals::Fixed(1)),
                field(2, "b", 5, Decimals::Fixed(3)),
            ],
        );
        node.fix_fields().unwrap();
        let meta = node.meta().clone();
        let tables = node.refer_tables().clone();

        node.fix_fields().unwrap();
        assert_eq!(node.meta(), &meta);
        assert_eq!(node.refer_tables(), &tables);
        assert_eq!(tables, ReferTables::from([PlanNodeId(1), PlanNodeId(2)]));
    }

    #[test]
    fn test_fix_fields_with_is_idempotent() {
        let node = FunctionNode::builtin(
            BuiltinFunc::Plus,
            vec![Item::column("t1.a"), Item::column("t2.b")],
        );
        let bound = node.fix_fields_with(&NumberedTables).unwrap();
        let meta = bound.meta().clone();
        let tables = bound.refer_tables().clone();
        let facts = bound.facts();
        assert!(meta.fixed);
        assert_eq!(tables, ReferTables::from([PlanNodeId(1), PlanNodeId(2)]));

        let rebound = bound.clone().fix_fields_with(&NumberedTables).unwrap();
        assert_eq!(rebound.meta(), &meta);
        assert_eq!(rebound.refer_tables(), &tables);
        assert_eq!(rebound.facts(), facts);
        assert_eq!(rebound, bound);
    }

    #[test]
    fn test_fix_fields_with_rederives_meta() {
        let node = FunctionNode::builtin(
            BuiltinFunc::Plus,
            vec![Item::column("t1.a"), Item::int(1)],
        );
        let mut bound = node.fix_fields_with(&NumberedTables).unwrap();
        assert!(bound.meta().maybe_null);
        let expected = bound.meta().clone();

        // Stale values left on an already fixed node
        bound.meta_mut().maybe_null = false;
        bound.meta_mut().max_length = 1;

        let rebound = bound.fix_fields_with(&NumberedTables).unwrap();
        assert!(rebound.meta().maybe_null);
        assert_eq!(rebound.meta(), &expected);
    }

    #[test]
    fn test_fix_fields_fails_on_unbound_column() {
        let mut node = FunctionNode::builtin(BuiltinFunc::IsNull, vec![Item::column("x")]);
        let err = node.fix_fields().unwrap_err();
        assert!(err.is_binding_failure());
        assert!(!node.meta().fixed);
    }

    #[test]
    fn test_signal_divide_by_null() {
        let mut node = FunctionNode::builtin(BuiltinFunc::Abs, vec![Item::int(1)]);
        assert!(!node.is_null());
        node.signal_divide_by_null();
        assert!(node.is_null());
        assert!(node.meta().maybe_null);
    }

    #[test]
    fn test_equality_uses_label() {
        let a = concat(vec![field(0, "a", 5, Decimals::Fixed(0)), Item::int(1)]);
        let b = concat(vec![field(0, "a", 5, Decimals::Fixed(0)), Item::int(1)]);
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());

        // Same label text from an unbound column still compares equal
        let c = concat(vec![Item::column("t0.a"), Item::int(1)]);
        assert_eq!(a, c);
        assert_eq!(a.hash_code(), c.hash_code());

        let d = concat(vec![field(0, "a", 5, Decimals::Fixed(0)), Item::int(2)]);
        assert_ne!(a, d);
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let a = concat(vec![Item::int(1), Item::int(2)]);
        let b = concat(vec![Item::int(2), Item::int(1)]);
        assert_ne!(a, b);
        assert_ne!(a.hash_code(), b.hash_code());
    }

    #[test]
    fn test_display() {
        let node = FunctionNode::builtin(
            BuiltinFunc::Eq,
            vec![field(0, "a", 5, Decimals::Fixed(0)), Item::literal(Value::Int(3))],
        );
        assert_eq!(node.to_string(), "(`t0`.`a` = 3)");
    }
}
