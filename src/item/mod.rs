//! Item model
//!
//! Immutable JSON data-model values: atomics (string, numeric, boolean,
//! null, date/time, duration, binary), objects, arrays and function items.
//! Evaluation code only relies on the predicates and accessors exposed here.

mod compare;
mod item;
mod json;

pub use compare::{compare_atomics, effective_boolean_value};
pub use item::{Item, Sequence};
pub use json::parse_json_line;
