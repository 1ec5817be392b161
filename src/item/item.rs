//! Immutable JSON data-model values

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike};
use num_traits::{FromPrimitive, ToPrimitive};

use crate::functions::FunctionItem;

/// An ordered sequence of items, the universal result shape
pub type Sequence = Vec<Item>;

/// A single immutable value
///
/// Structured values share their contents through `Arc`, so cloning an item
/// is cheap and items can cross partition boundaries freely.
#[derive(Clone)]
pub enum Item {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(BigDecimal),
    Double(f64),
    String(Arc<str>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// Time of day with an optional timezone
    Time(NaiveTime, Option<FixedOffset>),
    Duration(Duration),
    Binary(Arc<[u8]>),
    /// Keys keep insertion order; duplicates are allowed and lookups see the first
    Object(Arc<Vec<(String, Item)>>),
    Array(Arc<Vec<Item>>),
    Function(Arc<FunctionItem>),
}

impl Item {
    pub fn string(value: impl AsRef<str>) -> Self {
        Item::String(Arc::from(value.as_ref()))
    }

    pub fn object(pairs: Vec<(String, Item)>) -> Self {
        Item::Object(Arc::new(pairs))
    }

    pub fn array(members: Vec<Item>) -> Self {
        Item::Array(Arc::new(members))
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Item::Binary(Arc::from(bytes.into()))
    }

    pub fn function(function: FunctionItem) -> Self {
        Item::Function(Arc::new(function))
    }

    // Type predicates

    pub fn is_null(&self) -> bool {
        matches!(self, Item::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Item::Boolean(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Item::String(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Item::Integer(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Item::Integer(_) | Item::Decimal(_) | Item::Double(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Item::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Item::Array(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Item::Function(_))
    }

    /// Atomic values are everything except objects, arrays and functions
    pub fn is_atomic(&self) -> bool {
        !matches!(self, Item::Object(_) | Item::Array(_) | Item::Function(_))
    }

    // Accessors

    /// Keys of an object in insertion order; empty for anything else
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Item::Object(pairs) => pairs.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Value of the first pair with this key
    pub fn item_by_key(&self, key: &str) -> Option<&Item> {
        match self {
            Item::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Members of an array; empty for anything else
    pub fn members(&self) -> &[Item] {
        match self {
            Item::Array(members) => members,
            _ => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Item::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Item::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers and decimals as an exact decimal
    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            Item::Integer(i) => Some(BigDecimal::from(*i)),
            Item::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// Any numeric value widened to a double
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Item::Integer(i) => Some(*i as f64),
            Item::Decimal(d) => Some(d.to_f64().unwrap_or(f64::NAN)),
            Item::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Item::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionItem>> {
        match self {
            Item::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Name of the most specific built-in type of this item
    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Null => "null",
            Item::Boolean(_) => "boolean",
            Item::Integer(_) => "integer",
            Item::Decimal(_) => "decimal",
            Item::Double(_) => "double",
            Item::String(_) => "string",
            Item::Date(_) => "date",
            Item::DateTime(_) => "dateTime",
            Item::Time(..) => "time",
            Item::Duration(_) => "duration",
            Item::Binary(_) => "base64Binary",
            Item::Object(_) => "object",
            Item::Array(_) => "array",
            Item::Function(_) => "function",
        }
    }

    /// Canonical double used for cross-type numeric hashing. Numbers that
    /// compare equal widen to the same double.
    fn numeric_hash_bits(value: f64) -> u64 {
        if value.is_nan() {
            f64::NAN.to_bits()
        } else if value == 0.0 {
            0.0f64.to_bits()
        } else {
            value.to_bits()
        }
    }
}

/// Structural equality: numbers compare across numeric types, NaN equals
/// NaN, objects compare pairwise in order, functions by identity.
impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Item::Null, Item::Null) => true,
            (Item::Boolean(a), Item::Boolean(b)) => a == b,
            (Item::Integer(a), Item::Integer(b)) => a == b,
            (Item::Decimal(a), Item::Decimal(b)) => a == b,
            (Item::Integer(i), Item::Decimal(d)) | (Item::Decimal(d), Item::Integer(i)) => {
                BigDecimal::from(*i) == *d
            }
            (Item::Integer(i), Item::Double(d)) | (Item::Double(d), Item::Integer(i)) => {
                integer_equals_double(*i, *d)
            }
            (Item::Decimal(x), Item::Double(d)) | (Item::Double(d), Item::Decimal(x)) => {
                BigDecimal::from_f64(*d).map_or(false, |d| d == *x)
            }
            (Item::Double(x), Item::Double(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Item::String(a), Item::String(b)) => a == b,
            (Item::Date(a), Item::Date(b)) => a == b,
            (Item::DateTime(a), Item::DateTime(b)) => a == b,
            (Item::Time(a, za), Item::Time(b, zb)) => time_key(a, za) == time_key(b, zb),
            (Item::Duration(a), Item::Duration(b)) => a == b,
            (Item::Binary(a), Item::Binary(b)) => a == b,
            (Item::Object(a), Item::Object(b)) => a == b,
            (Item::Array(a), Item::Array(b)) => a == b,
            (Item::Function(a), Item::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Item::Null => 0u8.hash(state),
            Item::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Item::Integer(_) | Item::Decimal(_) | Item::Double(_) => {
                2u8.hash(state);
                let value = self.as_double().unwrap_or_default();
                Self::numeric_hash_bits(value).hash(state);
            }
            Item::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Item::Date(d) => {
                4u8.hash(state);
                d.hash(state);
            }
            Item::DateTime(dt) => {
                5u8.hash(state);
                dt.hash(state);
            }
            Item::Time(t, zone) => {
                6u8.hash(state);
                time_key(t, zone).hash(state);
            }
            Item::Duration(d) => {
                7u8.hash(state);
                d.hash(state);
            }
            Item::Binary(bytes) => {
                8u8.hash(state);
                bytes.hash(state);
            }
            Item::Object(pairs) => {
                9u8.hash(state);
                pairs.hash(state);
            }
            Item::Array(members) => {
                10u8.hash(state);
                members.hash(state);
            }
            Item::Function(f) => {
                11u8.hash(state);
                (Arc::as_ptr(f) as usize).hash(state);
            }
        }
    }
}

/// Exact: only a double holding precisely this integer is equal to it
fn integer_equals_double(i: i64, d: f64) -> bool {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    d.fract() == 0.0 && (-BOUND..BOUND).contains(&d) && d as i64 == i
}

/// Seconds and nanoseconds since midnight UTC; times without a zone are
/// read as UTC
pub(crate) fn time_key(time: &NaiveTime, zone: &Option<FixedOffset>) -> (i64, u32) {
    let offset = zone.map(|z| z.local_minus_utc() as i64).unwrap_or(0);
    (
        time.num_seconds_from_midnight() as i64 - offset,
        time.nanosecond(),
    )
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Function(function) => write!(f, "{}", function.identifier()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Item {
    fn from(value: bool) -> Self {
        Item::Boolean(value)
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Self {
        Item::Integer(value)
    }
}

impl From<BigDecimal> for Item {
    fn from(value: BigDecimal) -> Self {
        Item::Decimal(value)
    }
}

impl From<f64> for Item {
    fn from(value: f64) -> Self {
        Item::Double(value)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::string(value)
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Item::String(Arc::from(value))
    }
}
