//! Field-level serde helpers that never fail on bad data.
//!
//! Stored habits come from older app versions and hand edits. A single bad
//! field must not make the whole document unreadable, so each helper decodes
//! through `serde_json::Value` and drops or coerces what it cannot use.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};
use serde_json::Value;

use crate::date::{parse_iso_date, parse_weekday_code, to_iso, weekday_code};
use crate::habit::{Achievement, Habit};
use crate::schedule::{Frequency, Schedule};

/// `Option<NaiveDate>` stored as `"YYYY-MM-DD"` or `""`.
pub mod opt_date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&to_iso(*d)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(v.as_str().and_then(parse_iso_date))
    }
}

/// Set of dates stored as a JSON array of ISO strings.
pub mod date_set {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BTreeSet<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(value.len()))?;
        for d in value {
            seq.serialize_element(&to_iso(*d))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<NaiveDate>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(v.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().and_then(parse_iso_date))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Weekdays stored as two-letter codes (`["MO","WE"]`).
pub mod weekdays {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[Weekday], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(value.len()))?;
        for day in value {
            seq.serialize_element(weekday_code(*day))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Weekday>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(v.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().and_then(parse_weekday_code))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Missing or null frequency stays `None` so it can be inferred later;
/// anything present but unrecognised decodes as daily.
pub fn frequency<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Frequency>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Null => None,
        Value::String(s) => Some(Frequency::parse(&s).unwrap_or(Frequency::Daily)),
        _ => Some(Frequency::Daily),
    })
}

/// Per-day counts. Malformed keys are dropped, counts are clamped to >= 0.
pub fn history<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<NaiveDate, u32>, D::Error> {
    let v = Value::deserialize(d)?;
    let mut out = BTreeMap::new();
    if let Value::Object(map) = v {
        for (key, count) in map {
            let Some(date) = parse_iso_date(&key) else {
                continue;
            };
            out.insert(date, count_from(&count));
        }
    }
    Ok(out)
}

/// Numeric target; strings holding a number are accepted, anything else is 1.
pub fn target<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = Value::deserialize(d)?;
    let n = match &v {
        Value::Number(_) => count_from(&v),
        Value::String(s) => s.trim().parse::<f64>().map(clamp_count).unwrap_or(1),
        _ => 1,
    };
    Ok(n)
}

/// Strings; numbers are kept as their text, anything else is empty.
pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Optional text; blank or non-string values are `None`.
pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string))
}

/// List of strings; non-string entries are dropped.
pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_array()
        .map(|items| items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect())
        .unwrap_or_default())
}

/// A schedule that is null or not an object decodes as the empty schedule.
pub fn schedule<'de, D: Deserializer<'de>>(d: D) -> Result<Schedule, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Object(_) => serde_json::from_value(v).unwrap_or_default(),
        _ => Schedule::default(),
    })
}

/// Achievements that cannot be read are dropped one by one.
pub fn achievements<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Achievement>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(decode_each(v, "achievement"))
}

/// Habits that cannot be read are dropped one by one; the rest survive.
pub fn habits<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Habit>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(decode_each(v, "habit"))
}

fn decode_each<T: serde::de::DeserializeOwned>(v: Value, what: &str) -> Vec<T> {
    let Value::Array(items) = v else {
        return Vec::new();
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(x) => Some(x),
            Err(e) => {
                tracing::warn!(index = i, error = %e, "dropping unreadable {what}");
                None
            }
        })
        .collect()
}

fn count_from(v: &Value) -> u32 {
    v.as_f64().map(clamp_count).unwrap_or(0)
}

fn clamp_count(n: f64) -> u32 {
    if n.is_nan() || n <= 0.0 {
        0
    } else if n >= u32::MAX as f64 {
        u32::MAX
    } else {
        n.floor() as u32
    }
}
