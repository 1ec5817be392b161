//! Function items
//!
//! A function item is immutable once built. Its closure is a snapshot of the
//! bindings visible where it was created, never a reference to a live frame,
//! and its body is a shared template that every invocation opens a fresh
//! copy of.

use std::fmt;
use std::sync::Arc;

use crate::context::{Bindings, Value};
use crate::item::Item;
use crate::runtime::Runtime;
use crate::types::SequenceType;

/// Declared parameter and return types
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub parameter_types: Vec<SequenceType>,
    pub return_type: SequenceType,
}

impl Signature {
    /// All parameters and the result unconstrained
    pub fn unconstrained(arity: usize) -> Self {
        Self {
            parameter_types: vec![SequenceType::unconstrained(); arity],
            return_type: SequenceType::unconstrained(),
        }
    }
}

/// A first-class function value
pub struct FunctionItem {
    name: Option<String>,
    parameters: Vec<String>,
    signature: Signature,
    body: Arc<dyn Runtime<Item>>,
    closure: Bindings,
}

impl FunctionItem {
    pub fn new(
        name: Option<String>,
        parameters: Vec<String>,
        signature: Signature,
        body: Arc<dyn Runtime<Item>>,
        closure: Bindings,
    ) -> Self {
        Self {
            name,
            parameters,
            signature,
            body,
            closure,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn body(&self) -> &Arc<dyn Runtime<Item>> {
        &self.body
    }

    pub fn closure(&self) -> &Bindings {
        &self.closure
    }

    /// `name#arity`, or `inline-function#arity` for anonymous functions
    pub fn identifier(&self) -> String {
        format!(
            "{}#{}",
            self.name.as_deref().unwrap_or("inline-function"),
            self.arity()
        )
    }

    /// Binds the supplied arguments into the closure and keeps the
    /// placeholder positions, in order, as the new parameter list
    ///
    /// The result is anonymous. The body template is shared with `self`.
    pub fn partially_apply(&self, arguments: Vec<Option<Value>>) -> FunctionItem {
        let mut closure = self.closure.clone();
        let mut parameters = Vec::new();
        let mut parameter_types = Vec::new();

        for ((name, declared), argument) in self
            .parameters
            .iter()
            .zip(&self.signature.parameter_types)
            .zip(arguments)
        {
            match argument {
                Some(value) => closure.bind(name.clone(), value),
                None => {
                    parameters.push(name.clone());
                    parameter_types.push(declared.clone());
                }
            }
        }

        FunctionItem {
            name: None,
            parameters,
            signature: Signature {
                parameter_types,
                return_type: self.signature.return_type.clone(),
            },
            body: Arc::clone(&self.body),
            closure,
        }
    }
}

impl fmt::Debug for FunctionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionItem")
            .field("identifier", &self.identifier())
            .field("parameters", &self.parameters)
            .field("closure", &self.closure.names())
            .finish()
    }
}
