//! Ordering and effective boolean value of items
//!
//! Ordering rules for atomics:
//! - numbers compare across integer, decimal and double
//! - strings, booleans, dates, times, dateTimes and durations compare within their own type
//! - null compares equal to null and less than any other atomic
//! - anything else is a type mismatch

use std::cmp::Ordering;

use bigdecimal::BigDecimal;
use num_traits::{FromPrimitive, Zero};

use super::item::{time_key, Item, Sequence};
use crate::errors::{EngineError, EngineResult};

/// Compares two atomic items.
pub fn compare_atomics(a: &Item, b: &Item) -> EngineResult<Ordering> {
    match (a, b) {
        (Item::Null, Item::Null) => Ok(Ordering::Equal),
        (Item::Null, other) if other.is_atomic() => Ok(Ordering::Less),
        (other, Item::Null) if other.is_atomic() => Ok(Ordering::Greater),
        (Item::Integer(x), Item::Integer(y)) => Ok(x.cmp(y)),
        (x, y) if x.is_numeric() && y.is_numeric() => Ok(compare_numbers(x, y)),
        (Item::String(x), Item::String(y)) => Ok(x.cmp(y)),
        (Item::Boolean(x), Item::Boolean(y)) => Ok(x.cmp(y)),
        (Item::Date(x), Item::Date(y)) => Ok(x.cmp(y)),
        (Item::DateTime(x), Item::DateTime(y)) => Ok(x.cmp(y)),
        (Item::Time(x, zx), Item::Time(y, zy)) => Ok(time_key(x, zx).cmp(&time_key(y, zy))),
        (Item::Duration(x), Item::Duration(y)) => Ok(x.cmp(y)),
        _ => Err(EngineError::type_mismatch(format!(
            "Cannot compare {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Exact comparison when neither side is a double, or when the double is
/// finite; NaN sorts before every other number
fn compare_numbers(x: &Item, y: &Item) -> Ordering {
    match (exact(x), exact(y)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => {
            let (a, b) = (x.as_double().unwrap_or_default(), y.as_double().unwrap_or_default());
            a.partial_cmp(&b)
                .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()).reverse())
        }
    }
}

fn exact(item: &Item) -> Option<BigDecimal> {
    match item {
        Item::Double(d) => BigDecimal::from_f64(*d),
        other => other.as_decimal(),
    }
}

/// Effective boolean value of a sequence.
pub fn effective_boolean_value(sequence: &Sequence) -> EngineResult<bool> {
    match sequence.as_slice() {
        [] => Ok(false),
        [single] => match single {
            Item::Boolean(b) => Ok(*b),
            Item::Null => Ok(false),
            Item::String(s) => Ok(!s.is_empty()),
            Item::Integer(i) => Ok(*i != 0),
            Item::Decimal(d) => Ok(!d.is_zero()),
            Item::Double(d) => Ok(*d != 0.0 && !d.is_nan()),
            Item::Object(_) | Item::Array(_) => Ok(true),
            other => Err(EngineError::type_mismatch(format!(
                "Effective boolean value is not defined for {}",
                other.type_name()
            ))),
        },
        [first, ..] if !first.is_atomic() => Ok(true),
        _ => Err(EngineError::type_mismatch(
            "Effective boolean value is not defined for a sequence of more than one atomic",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ordering_crosses_types() {
        assert_eq!(
            compare_atomics(&Item::Integer(2), &Item::Double(2.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_atomics(&Item::Decimal(BigDecimal::from(3)), &Item::Integer(3)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare_atomics(&Item::Integer((1 << 53) + 1), &Item::Double((1u64 << 53) as f64))
                .unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            compare_atomics(&Item::Double(f64::NAN), &Item::Integer(0)).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(
            compare_atomics(&Item::Null, &Item::string("a")).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_atomics(&Item::Boolean(false), &Item::Null).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_incomparable_types_fail() {
        let err = compare_atomics(&Item::Integer(1), &Item::string("1")).unwrap_err();
        assert_eq!(err.code().code(), "TQ_TYPE_MISMATCH");
        assert!(compare_atomics(&Item::array(vec![]), &Item::Null).is_err());
    }

    #[test]
    fn test_effective_boolean_value() {
        assert!(!effective_boolean_value(&vec![]).unwrap());
        assert!(effective_boolean_value(&vec![Item::string("x")]).unwrap());
        assert!(!effective_boolean_value(&vec![Item::Integer(0)]).unwrap());
        assert!(effective_boolean_value(&vec![Item::object(vec![]), Item::Null]).unwrap());
        assert!(effective_boolean_value(&vec![Item::Integer(1), Item::Integer(2)]).is_err());
    }
}
