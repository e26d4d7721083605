//! Scalar expression engine.
//!
//! This module provides:
//! - `Item`: expression tree nodes (literals, columns, functions, subqueries)
//! - `FunctionNode`: type inference, name resolution and push-down ownership
//! - `BuiltinFunc` and `FunctionRegistry`: the closed built-in set and the
//!   name-based factory that also accepts user-defined functions
//! - `Functype`: semantic classification used by optimizer rules

pub mod builtin;
pub mod function;
pub mod functype;
pub mod item;
pub mod registry;
pub mod resolver;

pub use builtin::BuiltinFunc;
pub use function::{Arity, FunctionKind, FunctionNode};
pub use functype::Functype;
pub use item::{ColumnRef, ExprFacts, FieldItem, Item, ItemMeta, Literal, ReferTables, SubqueryItem};
pub use registry::{FunctionDef, FunctionRegistry, LengthInference};
pub use resolver::{NameResolutionContext, PlanResolver};
