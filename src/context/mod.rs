//! Dynamic context
//!
//! A chain of immutable frames. Each frame holds its own bindings, a handle
//! to the session and the module's function registry. New scopes add child
//! frames; no frame is modified after it is built.

mod bindings;
mod value;

pub use bindings::Bindings;
pub use value::Value;

use std::sync::Arc;

use crate::errors::{EngineError, EngineResult};
use crate::functions::FunctionRegistry;
use crate::session::Session;

/// One frame of the variable environment
#[derive(Debug)]
pub struct DynamicContext {
    parent: Option<Arc<DynamicContext>>,
    bindings: Bindings,
    session: Arc<Session>,
    registry: Arc<FunctionRegistry>,
}

impl DynamicContext {
    /// The empty root frame of an evaluation
    pub fn root(session: Arc<Session>, registry: Arc<FunctionRegistry>) -> Arc<Self> {
        Self::detached(session, registry, Bindings::new())
    }

    /// A parentless frame holding exactly `bindings`
    pub fn detached(
        session: Arc<Session>,
        registry: Arc<FunctionRegistry>,
        bindings: Bindings,
    ) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            bindings,
            session,
            registry,
        })
    }

    /// A child frame with additional bindings
    pub fn child(self: &Arc<Self>, bindings: Bindings) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            bindings,
            session: Arc::clone(&self.session),
            registry: Arc::clone(&self.registry),
        })
    }

    /// A child frame with a single binding
    pub fn with_binding(self: &Arc<Self>, name: &str, value: Value) -> Arc<Self> {
        self.child(Bindings::new().with(name, value))
    }

    /// Nearest binding of `name`, walking towards the root
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(value) = current.bindings.get(name) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    pub fn variable(&self, name: &str) -> EngineResult<Value> {
        self.lookup(name)
            .ok_or_else(|| EngineError::undefined_variable(name))
    }

    /// Every visible binding copied into one map; nearer frames win
    pub fn snapshot(&self) -> Bindings {
        let mut chain = Vec::new();
        let mut frame = Some(self);
        while let Some(current) = frame {
            chain.push(&current.bindings);
            frame = current.parent.as_deref();
        }

        let mut snapshot = Bindings::new();
        for bindings in chain.into_iter().rev() {
            snapshot.merge(bindings);
        }
        snapshot
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Number of frames up to the root
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = self.parent.as_deref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent.as_deref();
        }
        depth
    }
}
