//! Built-in functions and operators.
//!
//! The set is closed: each variant knows its name, classification, arity,
//! the facts it contributes and how its result type is inferred. Every
//! variant is registered by name in `FunctionRegistry::with_builtins`.

use crate::error::Result;
use crate::expression::function::{Arity, FunctionNode};
use crate::expression::functype::Functype;
use crate::expression::item::{ExprFacts, Item, ItemMeta};
use crate::types::{Decimals, FieldType, ItemResult, Value, DECIMAL_MAX_SCALE};
use std::fmt;

/// Extra scale digits a fixed-point division (or average) produces
pub const DIV_PRECISION_INCREMENT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunc {
    // Comparison
    Eq,
    NullSafeEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,

    // NULL tests
    IsNull,
    IsNotNull,

    // Logical
    And,
    Or,
    Xor,
    Not,

    Between,
    In,

    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    IntDiv,
    Mod,
    Neg,
    Abs,

    // String and control flow
    Concat,
    CastChar,
    Coalesce,
    IfNull,
    Greatest,
    Least,

    // Non-deterministic
    Now,
    Rand,
    Uuid,
    UserVar,
    SysVar,

    // Spatial relations
    StContains,
    StIntersects,
    StWithin,

    // Aggregates
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

/// How a function is written in SQL
enum Shape {
    Infix(&'static str),
    Chain(&'static str),
    Prefix(&'static str),
    Postfix(&'static str),
    Between,
    In,
    Cast,
    Variable(&'static str),
    Call,
}

impl BuiltinFunc {
    pub const ALL: &'static [BuiltinFunc] = &[
        BuiltinFunc::Eq,
        BuiltinFunc::NullSafeEq,
        BuiltinFunc::Ne,
        BuiltinFunc::Lt,
        BuiltinFunc::Le,
        BuiltinFunc::Gt,
        BuiltinFunc::Ge,
        BuiltinFunc::Like,
        BuiltinFunc::IsNull,
        BuiltinFunc::IsNotNull,
        BuiltinFunc::And,
        BuiltinFunc::Or,
        BuiltinFunc::Xor,
        BuiltinFunc::Not,
        BuiltinFunc::Between,
        BuiltinFunc::In,
        BuiltinFunc::Plus,
        BuiltinFunc::Minus,
        BuiltinFunc::Mul,
        BuiltinFunc::Div,
        BuiltinFunc::IntDiv,
        BuiltinFunc::Mod,
        BuiltinFunc::Neg,
        BuiltinFunc::Abs,
        BuiltinFunc::Concat,
        BuiltinFunc::CastChar,
        BuiltinFunc::Coalesce,
        BuiltinFunc::IfNull,
        BuiltinFunc::Greatest,
        BuiltinFunc::Least,
        BuiltinFunc::Now,
        BuiltinFunc::Rand,
        BuiltinFunc::Uuid,
        BuiltinFunc::UserVar,
        BuiltinFunc::SysVar,
        BuiltinFunc::StContains,
        BuiltinFunc::StIntersects,
        BuiltinFunc::StWithin,
        BuiltinFunc::Sum,
        BuiltinFunc::Count,
        BuiltinFunc::Avg,
        BuiltinFunc::Min,
        BuiltinFunc::Max,
    ];

    /// Registry name; also the identity used for equality
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunc::Eq => "=",
            BuiltinFunc::NullSafeEq => "<=>",
            BuiltinFunc::Ne => "<>",
            BuiltinFunc::Lt => "<",
            BuiltinFunc::Le => "<=",
            BuiltinFunc::Gt => ">",
            BuiltinFunc::Ge => ">=",
            BuiltinFunc::Like => "like",
            BuiltinFunc::IsNull => "isnull",
            BuiltinFunc::IsNotNull => "isnotnull",
            BuiltinFunc::And => "and",
            BuiltinFunc::Or => "or",
            BuiltinFunc::Xor => "xor",
            BuiltinFunc::Not => "not",
            BuiltinFunc::Between => "between",
            BuiltinFunc::In => "in",
            BuiltinFunc::Plus => "+",
            BuiltinFunc::Minus => "-",
            BuiltinFunc::Mul => "*",
            BuiltinFunc::Div => "/",
            BuiltinFunc::IntDiv => "div",
            BuiltinFunc::Mod => "%",
            BuiltinFunc::Neg => "neg",
            BuiltinFunc::Abs => "abs",
            BuiltinFunc::Concat => "concat",
            BuiltinFunc::CastChar => "cast_as_char",
            BuiltinFunc::Coalesce => "coalesce",
            BuiltinFunc::IfNull => "ifnull",
            BuiltinFunc::Greatest => "greatest",
            BuiltinFunc::Least => "least",
            BuiltinFunc::Now => "now",
            BuiltinFunc::Rand => "rand",
            BuiltinFunc::Uuid => "uuid",
            BuiltinFunc::UserVar => "get_user_var",
            BuiltinFunc::SysVar => "get_system_var",
            BuiltinFunc::StContains => "st_contains",
            BuiltinFunc::StIntersects => "st_intersects",
            BuiltinFunc::StWithin => "st_within",
            BuiltinFunc::Sum => "sum",
            BuiltinFunc::Count => "count",
            BuiltinFunc::Avg => "avg",
            BuiltinFunc::Min => "min",
            BuiltinFunc::Max => "max",
        }
    }

    pub fn functype(self) -> Functype {
        match self {
            BuiltinFunc::Eq => Functype::EqFunc,
            BuiltinFunc::NullSafeEq => Functype::EqualFunc,
            BuiltinFunc::Ne => Functype::NeFunc,
            BuiltinFunc::Lt => Functype::LtFunc,
            BuiltinFunc::Le => Functype::LeFunc,
            BuiltinFunc::Gt => Functype::GtFunc,
            BuiltinFunc::Ge => Functype::GeFunc,
            BuiltinFunc::Like => Functype::LikeFunc,
            BuiltinFunc::IsNull => Functype::IsNullFunc,
            BuiltinFunc::IsNotNull => Functype::IsNotNullFunc,
            BuiltinFunc::And => Functype::CondAndFunc,
            BuiltinFunc::Or => Functype::CondOrFunc,
            BuiltinFunc::Xor => Functype::XorFunc,
            BuiltinFunc::Not => Functype::NotFunc,
            BuiltinFunc::Between => Functype::Between,
            BuiltinFunc::In => Functype::InFunc,
            BuiltinFunc::Neg => Functype::NegFunc,
            BuiltinFunc::CastChar => Functype::CharTypecastFunc,
            BuiltinFunc::Now => Functype::NowFunc,
            BuiltinFunc::UserVar => Functype::GUserVarFunc,
            BuiltinFunc::SysVar => Functype::GSysVarFunc,
            BuiltinFunc::StContains => Functype::SpContainsFunc,
            BuiltinFunc::StIntersects => Functype::SpIntersectsFunc,
            BuiltinFunc::StWithin => Functype::SpWithinFunc,
            _ => Functype::UnknownFunc,
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            BuiltinFunc::IsNull
            | BuiltinFunc::IsNotNull
            | BuiltinFunc::Not
            | BuiltinFunc::Neg
            | BuiltinFunc::Abs
            | BuiltinFunc::CastChar
            | BuiltinFunc::UserVar
            | BuiltinFunc::SysVar
            | BuiltinFunc::Sum
            | BuiltinFunc::Count
            | BuiltinFunc::Avg
            | BuiltinFunc::Min
            | BuiltinFunc::Max => Arity::Exact(1),
            BuiltinFunc::And | BuiltinFunc::Or | BuiltinFunc::In => Arity::AtLeast(2),
            BuiltinFunc::Greatest | BuiltinFunc::Least => Arity::AtLeast(2),
            BuiltinFunc::Concat | BuiltinFunc::Coalesce => Arity::AtLeast(1),
            BuiltinFunc::Between => Arity::Exact(3),
            BuiltinFunc::Now | BuiltinFunc::Rand => Arity::Range(0, 1),
            BuiltinFunc::Uuid => Arity::Exact(0),
            _ => Arity::Exact(2),
        }
    }

    /// Facts the function contributes regardless of its arguments
    pub fn own_facts(self) -> ExprFacts {
        match self {
            BuiltinFunc::Sum
            | BuiltinFunc::Count
            | BuiltinFunc::Avg
            | BuiltinFunc::Min
            | BuiltinFunc::Max => ExprFacts {
                has_aggregate: true,
                ..ExprFacts::NONE
            },
            // Each of these can be TRUE on a null-extended row
            BuiltinFunc::IsNull
            | BuiltinFunc::IfNull
            | BuiltinFunc::Coalesce
            | BuiltinFunc::NullSafeEq => ExprFacts {
                has_is_null: true,
                ..ExprFacts::NONE
            },
            BuiltinFunc::Now
            | BuiltinFunc::Rand
            | BuiltinFunc::Uuid
            | BuiltinFunc::UserVar
            | BuiltinFunc::SysVar => ExprFacts {
                has_volatile: true,
                ..ExprFacts::NONE
            },
            _ => ExprFacts::NONE,
        }
    }

    pub fn is_aggregate(self) -> bool {
        self.own_facts().has_aggregate
    }

    fn shape(self) -> Shape {
        match self {
            BuiltinFunc::Eq => Shape::Infix("="),
            BuiltinFunc::NullSafeEq => Shape::Infix("<=>"),
            BuiltinFunc::Ne => Shape::Infix("<>"),
            BuiltinFunc::Lt => Shape::Infix("<"),
            BuiltinFunc::Le => Shape::Infix("<="),
            BuiltinFunc::Gt => Shape::Infix(">"),
            BuiltinFunc::Ge => Shape::Infix(">="),
            BuiltinFunc::Like => Shape::Infix("LIKE"),
            BuiltinFunc::Xor => Shape::Infix("XOR"),
            BuiltinFunc::Plus => Shape::Infix("+"),
            BuiltinFunc::Minus => Shape::Infix("-"),
            BuiltinFunc::Mul => Shape::Infix("*"),
            BuiltinFunc::Div => Shape::Infix("/"),
            BuiltinFunc::IntDiv => Shape::Infix("DIV"),
            BuiltinFunc::Mod => Shape::Infix("%"),
            BuiltinFunc::And => Shape::Chain("AND"),
            BuiltinFunc::Or => Shape::Chain("OR"),
            BuiltinFunc::Not => Shape::Prefix("NOT "),
            BuiltinFunc::Neg => Shape::Prefix("-"),
            BuiltinFunc::IsNull => Shape::Postfix(" IS NULL"),
            BuiltinFunc::IsNotNull => Shape::Postfix(" IS NOT NULL"),
            BuiltinFunc::Between => Shape::Between,
            BuiltinFunc::In => Shape::In,
            BuiltinFunc::CastChar => Shape::Cast,
            BuiltinFunc::UserVar => Shape::Variable("@"),
            BuiltinFunc::SysVar => Shape::Variable("@@"),
            _ => Shape::Call,
        }
    }

    pub(crate) fn render(self, args: &[Item], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.shape(), args) {
            (Shape::Infix(op), [left, right]) => write!(f, "({} {} {})", left, op, right),
            (Shape::Chain(op), _) => {
                write!(f, "(")?;
                write_list(args, &format!(" {} ", op), f)?;
                write!(f, ")")
            }
            (Shape::Prefix(op), [operand]) => write!(f, "({}{})", op, operand),
            (Shape::Postfix(op), [operand]) => write!(f, "({}{})", operand, op),
            (Shape::Between, [expr, low, high]) => {
                write!(f, "({} BETWEEN {} AND {})", expr, low, high)
            }
            (Shape::In, [expr, list @ ..]) => {
                write!(f, "({} IN (", expr)?;
                write_list(list, ", ", f)?;
                write!(f, "))")
            }
            (Shape::Cast, [operand]) => write!(f, "CAST({} AS CHAR)", operand),
            (Shape::Variable(prefix), [Item::Literal(lit)]) => match &lit.value {
                Value::String(name) => write!(f, "{}{}", prefix, name),
                other => write!(f, "{}({})", self.name(), other),
            },
            _ => {
                write!(f, "{}(", self.name())?;
                write_list(args, ", ", f)?;
                write!(f, ")")
            }
        }
    }

    pub(crate) fn fix_length_and_dec(self, node: &mut FunctionNode) -> Result<()> {
        match self {
            BuiltinFunc::Eq
            | BuiltinFunc::Ne
            | BuiltinFunc::Lt
            | BuiltinFunc::Le
            | BuiltinFunc::Gt
            | BuiltinFunc::Ge
            | BuiltinFunc::Like
            | BuiltinFunc::And
            | BuiltinFunc::Or
            | BuiltinFunc::Xor
            | BuiltinFunc::Not
            | BuiltinFunc::Between
            | BuiltinFunc::In
            | BuiltinFunc::StContains
            | BuiltinFunc::StIntersects
            | BuiltinFunc::StWithin => set_boolean(node.meta_mut()),
            BuiltinFunc::NullSafeEq | BuiltinFunc::IsNull | BuiltinFunc::IsNotNull => {
                set_boolean(node.meta_mut());
                node.meta_mut().maybe_null = false;
            }
            BuiltinFunc::Plus | BuiltinFunc::Minus | BuiltinFunc::Mul => {
                let result = numeric_result(node.arguments());
                apply_numeric(node, result);
            }
            BuiltinFunc::Div => {
                let result = numeric_result(node.arguments());
                if result == ItemResult::Real {
                    apply_numeric(node, result);
                } else {
                    apply_widened_decimal(node);
                }
                node.meta_mut().maybe_null = true;
                check_divisor(node);
            }
            BuiltinFunc::IntDiv => {
                node.count_decimal_length();
                let meta = node.meta_mut();
                let scale = meta.decimals.scale().unwrap_or(0);
                meta.max_length -= scale;
                meta.decimals = Decimals::Fixed(0);
                meta.field_type = FieldType::LongLong;
                meta.maybe_null = true;
                check_divisor(node);
            }
            BuiltinFunc::Mod => {
                let result = numeric_result(node.arguments());
                apply_numeric(node, result);
                node.meta_mut().maybe_null = true;
                check_divisor(node);
            }
            BuiltinFunc::Neg | BuiltinFunc::Abs => {
                let result = numeric_result(node.arguments());
                let (max_length, decimals) = first_arg_length(node);
                let meta = node.meta_mut();
                meta.max_length = if self == BuiltinFunc::Neg {
                    max_length.saturating_add(1)
                } else {
                    max_length
                };
                meta.decimals = decimals;
                meta.field_type = result.field_type();
            }
            BuiltinFunc::Concat | BuiltinFunc::CastChar => node.count_string_result_length()?,
            BuiltinFunc::Coalesce | BuiltinFunc::IfNull => {
                apply_merged(node)?;
                let maybe_null = match self {
                    BuiltinFunc::Coalesce => node.arguments().iter().all(Item::maybe_null),
                    _ => node.arguments()[1].maybe_null(),
                };
                node.meta_mut().maybe_null = maybe_null;
            }
            BuiltinFunc::Greatest | BuiltinFunc::Least => match temporal_result(node) {
                Some(field_type) => {
                    let meta = node.meta_mut();
                    meta.field_type = field_type;
                    meta.max_length = field_type.default_length();
                    meta.decimals = Decimals::Fixed(0);
                }
                None => apply_merged(node)?,
            },
            BuiltinFunc::Now => {
                let fsp = match node.arguments().first() {
                    Some(Item::Literal(lit)) => match lit.value {
                        Value::Int(n) => n.clamp(0, 6) as u32,
                        _ => 0,
                    },
                    _ => 0,
                };
                let meta = node.meta_mut();
                meta.field_type = FieldType::DateTime;
                meta.max_length = FieldType::DateTime.default_length() + if fsp > 0 { fsp + 1 } else { 0 };
                meta.decimals = Decimals::Fixed(fsp);
                meta.maybe_null = false;
            }
            BuiltinFunc::Rand => {
                let meta = node.meta_mut();
                meta.field_type = FieldType::Double;
                meta.max_length = FieldType::Double.default_length();
                meta.decimals = Decimals::NotFixed;
                meta.maybe_null = false;
            }
            BuiltinFunc::Uuid => {
                let meta = node.meta_mut();
                meta.field_type = FieldType::VarString;
                meta.max_length = 36;
                meta.decimals = Decimals::NotFixed;
                meta.maybe_null = false;
            }
            BuiltinFunc::UserVar | BuiltinFunc::SysVar => {
                let meta = node.meta_mut();
                meta.field_type = FieldType::VarString;
                meta.max_length = FieldType::VarString.default_length();
                meta.decimals = Decimals::NotFixed;
                meta.maybe_null = true;
            }
            BuiltinFunc::Sum | BuiltinFunc::Avg => {
                let result = numeric_result(node.arguments());
                if result == ItemResult::Real {
                    apply_numeric(node, result);
                } else if self == BuiltinFunc::Avg {
                    apply_widened_decimal(node);
                } else {
                    apply_numeric(node, ItemResult::Decimal);
                }
                node.meta_mut().maybe_null = true;
            }
            BuiltinFunc::Count => {
                let meta = node.meta_mut();
                meta.field_type = FieldType::LongLong;
                meta.max_length = 21;
                meta.decimals = Decimals::Fixed(0);
                meta.maybe_null = false;
            }
            BuiltinFunc::Min | BuiltinFunc::Max => {
                let arg = node.arguments()[0].meta().clone();
                let meta = node.meta_mut();
                meta.field_type = arg.field_type;
                meta.max_length = arg.max_length;
                meta.decimals = arg.decimals;
                meta.maybe_null = true;
            }
        }
        Ok(())
    }

    pub(crate) fn count_string_result_length(self, node: &mut FunctionNode) -> Result<()> {
        let lengths = node.arguments().iter().map(Item::max_length);
        let max_length = match self {
            BuiltinFunc::Concat => lengths.fold(0u32, u32::saturating_add),
            BuiltinFunc::CastChar
            | BuiltinFunc::Coalesce
            | BuiltinFunc::IfNull
            | BuiltinFunc::Greatest
            | BuiltinFunc::Least => lengths.max().unwrap_or(0),
            _ => return Ok(()),
        };

        let meta = node.meta_mut();
        meta.max_length = max_length;
        meta.decimals = Decimals::NotFixed;
        meta.field_type = FieldType::VarString;
        Ok(())
    }
}

fn write_list(items: &[Item], sep: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn set_boolean(meta: &mut ItemMeta) {
    meta.field_type = FieldType::LongLong;
    meta.max_length = 1;
    meta.decimals = Decimals::Fixed(0);
}

/// Domain arithmetic over the arguments is evaluated in; NULL literals are ignored
fn numeric_result(args: &[Item]) -> ItemResult {
    args.iter()
        .filter(|arg| arg.field_type() != FieldType::Null)
        .map(Item::result_type)
        .fold(ItemResult::Int, ItemResult::numeric_merge)
}

/// Like `numeric_result`, but all-string arguments stay in the string domain
fn merged_result(args: &[Item]) -> ItemResult {
    let all_strings = args
        .iter()
        .filter(|arg| arg.field_type() != FieldType::Null)
        .all(|arg| arg.result_type() == ItemResult::String);
    if all_strings {
        ItemResult::String
    } else {
        numeric_result(args)
    }
}

fn apply_numeric(node: &mut FunctionNode, result: ItemResult) {
    match result {
        ItemResult::Real => node.count_real_length(),
        _ => node.count_decimal_length(),
    }
    node.meta_mut().field_type = result.field_type();
}

fn apply_merged(node: &mut FunctionNode) -> Result<()> {
    match merged_result(node.arguments()) {
        ItemResult::String => node.count_string_result_length(),
        result => {
            apply_numeric(node, result);
            Ok(())
        }
    }
}

/// Fixed-point result with `DIV_PRECISION_INCREMENT` extra scale digits
fn apply_widened_decimal(node: &mut FunctionNode) {
    node.count_decimal_length();
    let meta = node.meta_mut();
    let scale = meta.decimals.scale().unwrap_or(0);
    let int_part = meta.max_length - scale;
    let widened = (scale + DIV_PRECISION_INCREMENT).min(DECIMAL_MAX_SCALE);
    meta.decimals = Decimals::Fixed(widened);
    meta.max_length = int_part + widened;
    meta.field_type = FieldType::NewDecimal;
}

fn first_arg_length(node: &FunctionNode) -> (u32, Decimals) {
    node.arguments()
        .first()
        .map(|arg| (arg.max_length(), arg.decimals()))
        .unwrap_or((0, Decimals::Fixed(0)))
}

/// Temporal result type implied by the column arguments, if any
fn temporal_result(node: &FunctionNode) -> Option<FieldType> {
    if node.has_datetime_args() || (node.has_date_args() && node.has_time_args()) {
        Some(FieldType::DateTime)
    } else if node.has_date_args() {
        Some(FieldType::Date)
    } else if node.has_time_args() {
        Some(FieldType::Time)
    } else if node.has_timestamp_args() {
        Some(FieldType::Timestamp)
    } else {
        None
    }
}

/// A constant zero or NULL divisor makes the result NULL
fn check_divisor(node: &mut FunctionNode) {
    let null_divisor = match node.arguments().get(1) {
        Some(Item::Literal(lit)) => lit.value.is_null() || lit.value.is_zero(),
        _ => false,
    };
    if null_divisor {
        node.signal_divide_by_null();
    }
}
