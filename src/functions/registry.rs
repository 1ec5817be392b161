//! # Function Registry

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::item::FunctionItem;
use crate::errors::{EngineError, EngineResult};

/// Module-level functions keyed by name and arity
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<(String, usize), Arc<FunctionItem>>>,
}

impl FunctionRegistry {
    /// Create a new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named function
    pub fn register(&self, function: FunctionItem) -> EngineResult<()> {
        let name = function
            .name()
            .ok_or_else(|| EngineError::invalid_argument("Only named functions can be registered"))?
            .to_string();
        let key = (name, function.arity());

        let mut functions = self
            .functions
            .write()
            .map_err(|_| EngineError::flow("Function registry lock poisoned"))?;
        if functions.contains_key(&key) {
            return Err(EngineError::invalid_argument(format!(
                "Function {}#{} is declared more than once",
                key.0, key.1
            )));
        }
        functions.insert(key, Arc::new(function));
        Ok(())
    }

    /// Get a function by name and arity
    pub fn get(&self, name: &str, arity: usize) -> EngineResult<Arc<FunctionItem>> {
        let functions = self
            .functions
            .read()
            .map_err(|_| EngineError::flow("Function registry lock poisoned"))?;
        functions
            .get(&(name.to_string(), arity))
            .cloned()
            .ok_or_else(|| EngineError::undefined_function(name, arity))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
