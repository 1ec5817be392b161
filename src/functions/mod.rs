//! # Functions
//!
//! Function items, the module-level registry, built-ins and the call
//! machinery shared by static and dynamic calls.

mod builtins;
mod call;
mod item;
mod registry;

pub use builtins::{Builtin, BuiltinCall};
pub use call::{invoke, DynamicCall, FunctionReference, InlineFunction, Invocation, StaticCall};
pub use item::{FunctionItem, Signature};
pub use registry::FunctionRegistry;
