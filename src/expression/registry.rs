//! Function factory.
//!
//! The registry maps lower-cased function names to what a node applies.
//! Structural cloning, calculation cloning and shard SQL rendering all go
//! through it: a function the registry does not know cannot leave the
//! planner. The process-wide instance is built once and then only read.

use crate::error::{PlanError, Result};
use crate::expression::builtin::BuiltinFunc;
use crate::expression::function::{Arity, FunctionKind, FunctionNode};
use crate::expression::item::Item;
use crate::types::FieldType;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Which inference strategy a registered function uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthInference {
    #[default]
    Real,
    Decimal,
    String,
}

impl LengthInference {
    pub fn default_field_type(self) -> FieldType {
        match self {
            LengthInference::Real => FieldType::Double,
            LengthInference::Decimal => FieldType::NewDecimal,
            LengthInference::String => FieldType::VarString,
        }
    }
}

/// Declaration of a user-defined function
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub arity: Arity,
    #[serde(default)]
    pub inference: LengthInference,
    /// Result differs between calls with the same arguments
    #[serde(default)]
    pub volatile: bool,
    /// Overrides the type implied by `inference`
    #[serde(default)]
    pub field_type: Option<FieldType>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, arity: Arity, inference: LengthInference) -> Self {
        Self {
            name: name.into(),
            arity,
            inference,
            volatile: false,
            field_type: None,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionKind>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in function
    pub fn with_builtins() -> Self {
        let functions = BuiltinFunc::ALL
            .iter()
            .map(|func| (func.name().to_string(), FunctionKind::Builtin(*func)))
            .collect();
        Self { functions }
    }

    pub fn register_udf(&mut self, def: FunctionDef) -> Result<()> {
        let key = def.name.to_lowercase();
        if self.functions.contains_key(&key) {
            return Err(PlanError::DuplicateFunction(def.name));
        }
        debug!("registered function {} ({} arguments)", def.name, def.arity);
        self.functions.insert(key, FunctionKind::Udf(Arc::new(def)));
        Ok(())
    }

    /// Whether `name` can be rebuilt and rendered for a shard
    pub fn is_native_func(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    /// Build an unfixed node applying `name` to `args`
    pub fn create_native_func(&self, name: &str, args: Vec<Item>) -> Result<FunctionNode> {
        let kind = self
            .functions
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| PlanError::UnknownFunction(name.to_string()))?;
        FunctionNode::try_new(kind, args)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Process-wide registry; holds the built-ins unless another one was installed first
    pub fn global() -> Arc<FunctionRegistry> {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(FunctionRegistry::with_builtins())))
    }

    /// Install the process-wide registry. Returns false if one is already in place.
    pub fn install_global(registry: Arc<FunctionRegistry>) -> bool {
        GLOBAL_REGISTRY.set(registry).is_ok()
    }
}
