//! Casting lexical strings to atomic types
//!
//! Date, time, duration and binary values have no JSON form, so JSON data
//! carries them as strings. Casting reads the lexical form:
//! - date `2024-03-01`
//! - dateTime `2024-03-01T10:00:00+01:00`, read as UTC without a zone
//! - time `10:00:00`, `10:00:00Z` or `10:00:00-05:00`
//! - duration `-P1DT2H30M15.5S` (days, hours, minutes, seconds)
//! - base64Binary in the standard alphabet

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use super::errors::{CatalogueError, CatalogueResult};
use super::sequence_type::ItemType;
use crate::item::Item;

/// Casts the lexical form `text` to an atomic item of type `target`
pub fn cast_string(text: &str, target: &ItemType) -> CatalogueResult<Item> {
    let text = text.trim();
    let cast = match target {
        ItemType::String | ItemType::Atomic | ItemType::Item => Some(Item::string(text)),
        ItemType::Integer => text.parse().ok().map(Item::Integer),
        ItemType::Decimal => BigDecimal::from_str(text).ok().map(Item::Decimal),
        ItemType::Double => parse_double(text).map(Item::Double),
        ItemType::Boolean => match text {
            "true" | "1" => Some(Item::Boolean(true)),
            "false" | "0" => Some(Item::Boolean(false)),
            _ => None,
        },
        ItemType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().map(Item::Date),
        ItemType::DateTime => parse_date_time(text).map(Item::DateTime),
        ItemType::Time => parse_time(text).map(|(time, zone)| Item::Time(time, zone)),
        ItemType::Duration => parse_duration(text).map(Item::Duration),
        ItemType::Base64Binary => STANDARD.decode(text).ok().map(Item::binary),
        _ => None,
    };

    cast.ok_or_else(|| CatalogueError::Cast {
        value: text.to_string(),
        target: target.to_string(),
    })
}

/// Types whose values arrive as strings in JSON data
pub fn is_lexical_only(target: &ItemType) -> bool {
    matches!(
        target,
        ItemType::Date
            | ItemType::DateTime
            | ItemType::Time
            | ItemType::Duration
            | ItemType::Base64Binary
    )
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok().filter(|d: &f64| d.is_finite()),
    }
}

fn utc() -> Option<FixedOffset> {
    FixedOffset::east_opt(0)
}

fn parse_date_time(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(text) {
        return Some(zoned);
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(utc()?.from_utc_datetime(&naive))
}

fn parse_time(text: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let (clock, zone) = split_zone(text)?;
    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S%.f").ok()?;
    Some((time, zone))
}

/// Splits a trailing `Z` or `+hh:mm` / `-hh:mm` from a clock value
fn split_zone(text: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(clock) = text.strip_suffix('Z') {
        return Some((clock, Some(utc()?)));
    }
    let split = text.len().checked_sub(6);
    let Some(split) = split.filter(|i| text.is_char_boundary(*i)) else {
        return Some((text, None));
    };
    let (clock, zone) = text.split_at(split);
    let sign = match zone.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Some((text, None)),
    };
    let (hours, minutes) = zone[1..].split_once(':')?;
    let seconds = hours.parse::<i32>().ok()? * 3600 + minutes.parse::<i32>().ok()? * 60;
    Some((clock, Some(FixedOffset::east_opt(sign * seconds)?)))
}

fn parse_duration(text: &str) -> Option<Duration> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    let (days, clock) = match rest.split_once('T') {
        Some((days, clock)) if !clock.is_empty() => (days, Some(clock)),
        Some(_) => return None,
        None => (rest, None),
    };
    if days.is_empty() && clock.is_none() {
        return None;
    }

    let mut seconds: i64 = 0;
    let mut nanos: i64 = 0;
    if !days.is_empty() {
        let days: i64 = days.strip_suffix('D')?.parse().ok()?;
        seconds = seconds.checked_add(days.checked_mul(86_400)?)?;
    }
    if let Some(mut clock) = clock {
        for (unit, scale) in [('H', 3_600i64), ('M', 60)] {
            if let Some((count, remainder)) = clock.split_once(unit) {
                let count: i64 = count.parse().ok()?;
                seconds = seconds.checked_add(count.checked_mul(scale)?)?;
                clock = remainder;
            }
        }
        if !clock.is_empty() {
            let value = clock.strip_suffix('S')?;
            let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
            seconds = seconds.checked_add(whole.parse().ok()?)?;
            if !fraction.is_empty() {
                let digits: String = fraction.chars().chain("000000000".chars()).take(9).collect();
                nanos = digits.parse().ok()?;
            }
        }
    }

    // Duration::seconds panics past this bound
    if seconds > i64::MAX / 1_000 {
        return None;
    }
    let duration = Duration::seconds(seconds) + Duration::nanoseconds(nanos);
    Some(if negative { -duration } else { duration })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_cast_dates_and_times() {
        let date = cast_string("2024-03-01", &ItemType::Date).unwrap();
        assert!(matches!(date, Item::Date(d) if d.year() == 2024 && d.month() == 3));

        let zoned = cast_string("2024-03-01T10:00:00+01:00", &ItemType::DateTime).unwrap();
        let naive = cast_string("2024-03-01T09:00:00", &ItemType::DateTime).unwrap();
        assert_eq!(zoned, naive);

        let time = cast_string("10:30:00-05:00", &ItemType::Time).unwrap();
        assert!(matches!(time, Item::Time(_, Some(z)) if z.local_minus_utc() == -5 * 3600));
        assert!(matches!(
            cast_string("10:30:00", &ItemType::Time).unwrap(),
            Item::Time(_, None)
        ));
    }

    #[test]
    fn test_cast_duration() {
        let duration = cast_string("P1DT2H30M15.5S", &ItemType::Duration).unwrap();
        let expected = Duration::seconds(86_400 + 2 * 3_600 + 30 * 60 + 15)
            + Duration::milliseconds(500);
        assert_eq!(duration, Item::Duration(expected));

        assert_eq!(
            cast_string("-PT1H", &ItemType::Duration).unwrap(),
            Item::Duration(Duration::seconds(-3_600))
        );
        assert!(cast_string("P", &ItemType::Duration).is_err());
        assert!(cast_string("PT", &ItemType::Duration).is_err());
    }

    #[test]
    fn test_cast_numbers_and_binary() {
        assert_eq!(cast_string(" 42 ", &ItemType::Integer).unwrap(), Item::Integer(42));
        assert_eq!(
            cast_string("0.1", &ItemType::Decimal).unwrap(),
            Item::Decimal(BigDecimal::from_str("0.1").unwrap())
        );
        assert_eq!(cast_string("AQID", &ItemType::Base64Binary).unwrap(), Item::binary(vec![1, 2, 3]));
    }

    #[test]
    fn test_bad_lexical_form() {
        let err = cast_string("2024-13-01", &ItemType::Date).unwrap_err();
        assert_eq!(
            err,
            CatalogueError::Cast {
                value: "2024-13-01".into(),
                target: "date".into()
            }
        );
        assert!(cast_string("{}", &ItemType::Object).is_err());
    }
}
