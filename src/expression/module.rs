//! Query modules
//!
//! A module is a JSON document holding function declarations and a body:
//!
//! ```json
//! {
//!   "functions": [{"name": "inc", "parameters": [{"name": "x", "type": "integer"}],
//!                  "return_type": "integer", "body": {...}}],
//!   "body": {"kind": "function-call", "name": "inc", "arguments": [...]}
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::node::{Expression, Parameter};
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::types::SequenceType;

/// A module-level function declaration
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: SequenceType,
    pub body: Expression,
    #[serde(default)]
    pub position: SourcePosition,
}

impl FunctionDeclaration {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Registry key: name and arity
    pub fn key(&self) -> (String, usize) {
        (self.name.clone(), self.arity())
    }
}

/// A parsed query module
#[derive(Debug, Clone, Deserialize)]
pub struct QueryModule {
    #[serde(default)]
    pub functions: Vec<FunctionDeclaration>,
    pub body: Expression,
}

impl QueryModule {
    /// Parse a module from JSON text
    pub fn from_json(content: &str) -> EngineResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| EngineError::invalid_argument(format!("Malformed query module: {}", e)))
    }

    /// Parse a module from a JSON value
    pub fn from_value(value: serde_json::Value) -> EngineResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| EngineError::invalid_argument(format!("Malformed query module: {}", e)))
    }

    /// Load a module file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::resource(format!("Cannot read query module {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Finds a declaration by name and arity
    pub fn declaration(&self, name: &str, arity: usize) -> Option<&FunctionDeclaration> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.arity() == arity)
    }
}
