//! Type catalogue
//!
//! Built-in item types, sequence types with occurrence indicators, and
//! user-declared object types. Declarations are supplied as values; no
//! external schema syntax is parsed here. Lexical strings cast to atomics.

mod cast;
mod catalogue;
mod errors;
mod sequence_type;

pub use cast::cast_string;
pub use catalogue::{FieldDef, ObjectType, TypeCatalogue};
pub use errors::{CatalogueError, CatalogueResult};
pub use sequence_type::{ItemType, Occurrence, SequenceType};
