//! Item types and sequence types
//!
//! A sequence type is an item type plus an occurrence indicator:
//! - `integer`  exactly one
//! - `integer?` zero or one
//! - `integer*` zero or more
//! - `integer+` one or more
//!
//! `()` denotes the empty sequence. Names that are not built-in are kept as
//! declared-type references and checked against the catalogue on resolve.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{CatalogueError, CatalogueResult};

/// Item types known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// Any item, including functions
    Item,
    /// Any atomic
    Atomic,
    String,
    Integer,
    Decimal,
    Double,
    /// Integer, decimal or double
    Numeric,
    Boolean,
    Null,
    Date,
    DateTime,
    Time,
    Duration,
    Base64Binary,
    Object,
    Array,
    Function,
    /// User-declared object type
    Declared(String),
}

impl ItemType {
    /// Every built-in type with its name
    pub const BUILTINS: [(&'static str, ItemType); 17] = [
        ("item", ItemType::Item),
        ("atomic", ItemType::Atomic),
        ("string", ItemType::String),
        ("integer", ItemType::Integer),
        ("decimal", ItemType::Decimal),
        ("double", ItemType::Double),
        ("numeric", ItemType::Numeric),
        ("boolean", ItemType::Boolean),
        ("null", ItemType::Null),
        ("date", ItemType::Date),
        ("dateTime", ItemType::DateTime),
        ("time", ItemType::Time),
        ("duration", ItemType::Duration),
        ("base64Binary", ItemType::Base64Binary),
        ("object", ItemType::Object),
        ("array", ItemType::Array),
        ("function", ItemType::Function),
    ];

    /// Looks up a built-in type by name
    pub fn builtin(name: &str) -> Option<ItemType> {
        Self::BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t.clone())
    }

    /// Returns the type name
    pub fn name(&self) -> &str {
        match self {
            ItemType::Declared(name) => name,
            builtin => Self::BUILTINS
                .iter()
                .find(|(_, t)| t == builtin)
                .map(|(n, _)| *n)
                .unwrap_or("item"),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Occurrence indicator of a sequence type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    /// Returns true if a sequence of `count` items satisfies this indicator
    pub fn admits(&self, count: usize) -> bool {
        match self {
            Occurrence::One => count == 1,
            Occurrence::ZeroOrOne => count <= 1,
            Occurrence::ZeroOrMore => true,
            Occurrence::OneOrMore => count >= 1,
        }
    }

    /// Maximum admitted count, if bounded
    pub fn max(&self) -> Option<usize> {
        match self {
            Occurrence::One | Occurrence::ZeroOrOne => Some(1),
            Occurrence::ZeroOrMore | Occurrence::OneOrMore => None,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Occurrence::One => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

/// A sequence type: an item type with an occurrence indicator, or `()`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequenceType {
    item_type: ItemType,
    occurrence: Occurrence,
    empty: bool,
}

impl SequenceType {
    pub fn new(item_type: ItemType, occurrence: Occurrence) -> Self {
        Self {
            item_type,
            occurrence,
            empty: false,
        }
    }

    /// The empty-sequence type `()`
    pub fn empty_sequence() -> Self {
        Self {
            item_type: ItemType::Item,
            occurrence: Occurrence::ZeroOrOne,
            empty: true,
        }
    }

    /// `item*`, the type that admits everything
    pub fn unconstrained() -> Self {
        Self::new(ItemType::Item, Occurrence::ZeroOrMore)
    }

    /// Parses the syntax of a sequence-type literal
    pub fn parse(literal: &str) -> CatalogueResult<Self> {
        let literal = literal.trim();
        if literal == "()" || literal == "empty-sequence()" {
            return Ok(Self::empty_sequence());
        }

        let (name, occurrence) = match literal.chars().last() {
            Some('?') => (&literal[..literal.len() - 1], Occurrence::ZeroOrOne),
            Some('*') => (&literal[..literal.len() - 1], Occurrence::ZeroOrMore),
            Some('+') => (&literal[..literal.len() - 1], Occurrence::OneOrMore),
            _ => (literal, Occurrence::One),
        };

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ':');
        if !valid_name {
            return Err(CatalogueError::InvalidSequenceType(literal.to_string()));
        }

        let item_type = ItemType::builtin(name).unwrap_or_else(|| ItemType::Declared(name.to_string()));
        Ok(Self::new(item_type, occurrence))
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn occurrence(&self) -> Occurrence {
        self.occurrence
    }

    /// True for `()`
    pub fn is_empty_sequence(&self) -> bool {
        self.empty
    }

    /// True for `item*`; arguments of this type skip promotion
    pub fn is_unconstrained(&self) -> bool {
        !self.empty && self.item_type == ItemType::Item && self.occurrence == Occurrence::ZeroOrMore
    }

    /// Returns true if a sequence of `count` items has an admissible length
    pub fn admits_count(&self, count: usize) -> bool {
        if self.empty {
            count == 0
        } else {
            self.occurrence.admits(count)
        }
    }
}

impl Default for SequenceType {
    fn default() -> Self {
        Self::unconstrained()
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            write!(f, "()")
        } else {
            write!(f, "{}{}", self.item_type, self.occurrence.suffix())
        }
    }
}

impl TryFrom<String> for SequenceType {
    type Error = CatalogueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SequenceType> for String {
    fn from(value: SequenceType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_occurrences() {
        let t = SequenceType::parse("integer*").unwrap();
        assert_eq!(t.item_type(), &ItemType::Integer);
        assert_eq!(t.occurrence(), Occurrence::ZeroOrMore);

        assert_eq!(SequenceType::parse("object?").unwrap().occurrence(), Occurrence::ZeroOrOne);
        assert_eq!(SequenceType::parse("string+").unwrap().occurrence(), Occurrence::OneOrMore);
        assert_eq!(SequenceType::parse("boolean").unwrap().occurrence(), Occurrence::One);
    }

    #[test]
    fn test_parse_declared_and_empty() {
        let t = SequenceType::parse("person").unwrap();
        assert_eq!(t.item_type(), &ItemType::Declared("person".into()));
        assert!(SequenceType::parse("()").unwrap().is_empty_sequence());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SequenceType::parse("*").is_err());
        assert!(SequenceType::parse("map(string)").is_err());
    }

    #[test]
    fn test_display_roundtrips_text() {
        for literal in ["integer*", "object?", "item", "dateTime+", "()"] {
            assert_eq!(SequenceType::parse(literal).unwrap().to_string(), literal);
        }
    }

    #[test]
    fn test_unconstrained() {
        assert!(SequenceType::parse("item*").unwrap().is_unconstrained());
        assert!(!SequenceType::parse("item+").unwrap().is_unconstrained());
    }

    #[test]
    fn test_admits_count() {
        let optional = SequenceType::parse("integer?").unwrap();
        assert!(optional.admits_count(0));
        assert!(!optional.admits_count(2));
        assert!(SequenceType::empty_sequence().admits_count(0));
        assert!(!SequenceType::empty_sequence().admits_count(1));
    }
}
